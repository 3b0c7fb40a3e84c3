//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
//! ARN parsing and normalisation.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const ARN_PREFIX: &str = "arn";
const ARN_SECTIONS: usize = 6;

/// Reasons an ARN string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArnError {
    #[error("missing \"arn:\" prefix")]
    MissingPrefix,
    #[error("expected 6 colon separated sections")]
    NotEnoughSections,
    #[error("failed to find ARN resource name: {0}")]
    MissingResourceName(String),
}

/// A parsed `arn:partition:service:region:account:resource` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    /// Everything after the fifth colon; may itself contain `:` and `/`.
    pub resource: String,
}

impl Arn {
    /// The part of the resource after its first `/`.
    ///
    /// For `arn:aws:iam::aws:policy/service-role/Foo` this is `service-role/Foo`.
    pub fn resource_name(&self) -> Result<&str, ArnError> {
        match self.resource.find('/') {
            Some(start) if start + 1 < self.resource.len() => Ok(&self.resource[start + 1..]),
            _ => Err(ArnError::MissingResourceName(self.resource.clone())),
        }
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only the shape is checked. Empty sections are left to callers such as
        // `resource_name`.
        let sections: Vec<&str> = s.splitn(ARN_SECTIONS, ':').collect();
        if sections.len() != ARN_SECTIONS {
            return Err(ArnError::NotEnoughSections);
        }
        if sections[0] != ARN_PREFIX {
            return Err(ArnError::MissingPrefix);
        }
        Ok(Self {
            partition: sections[1].to_owned(),
            service: sections[2].to_owned(),
            region: sections[3].to_owned(),
            account_id: sections[4].to_owned(),
            resource: sections[5].to_owned(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            ARN_PREFIX, self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Keep only the last element of an ARN's resource path.
///
/// The IAM authenticator does not recognise role ARNs with a path other than `/`
/// in the aws-auth mapping, so `arn:aws:iam::123:role/a/b/Role` has to be
/// declared as `arn:aws:iam::123:role/Role`. Input without a `/` is returned as is.
pub fn normalize_arn(arn: &str) -> String {
    match (arn.split_once('/'), arn.rsplit_once('/')) {
        (Some((head, _)), Some((_, last))) => format!("{}/{}", head, last),
        _ => arn.to_owned(),
    }
}
