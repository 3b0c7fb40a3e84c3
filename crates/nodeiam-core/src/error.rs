//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use thiserror::Error;

use crate::arn::ArnError;

pub type Result<T> = std::result::Result<T, IamError>;

#[derive(Debug, Error)]
pub enum IamError {
    /// An attached policy ARN could not be parsed or has no resource name.
    #[error("malformed ARN {arn:?}: {reason}")]
    MalformedArn { arn: String, reason: ArnError },
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
