//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use nodeiam_common::Partition;
use serde::{Deserialize, Serialize};

/// IAM policy language version stamped on every document.
pub const POLICY_VERSION: &str = "2012-10-17";

const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

/// Statement effect. Node roles only ever grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
}

/// Principal block of a trust policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: Vec<String>,
}

/// A single statement of a policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

/// IAM policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    /// Single allow statement over `resource`.
    pub fn allow(resource: String, actions: &[&str]) -> Self {
        Self {
            version: POLICY_VERSION.to_owned(),
            statement: vec![Statement {
                effect: Effect::Allow,
                action: actions.iter().map(|action| (*action).to_owned()).collect(),
                resource: Some(resource),
                principal: None,
            }],
        }
    }

    /// Trust policy letting the given service principals assume the role.
    pub fn assume_role_for_services(services: Vec<String>) -> Self {
        Self {
            version: POLICY_VERSION.to_owned(),
            statement: vec![Statement {
                effect: Effect::Allow,
                action: vec![ASSUME_ROLE_ACTION.to_owned()],
                resource: None,
                principal: Some(Principal { service: services }),
            }],
        }
    }
}

/// Service principal for `service` in the given partition, e.g. `ec2.amazonaws.com`.
pub fn service_principal(service: &str, partition: Partition) -> String {
    format!("{}.{}", service, partition.url_suffix())
}

/// Resource scope of an allow statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceScope {
    /// `*`, for APIs without resource-level permissions.
    Any,
    /// An ARN pattern without its `arn:<partition>:` prefix, e.g. `route53:::hostedzone/*`.
    Partitioned(&'static str),
}

impl ResourceScope {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, ResourceScope::Any)
    }

    pub fn render(&self, partition: Partition) -> String {
        match self {
            ResourceScope::Any => "*".to_owned(),
            ResourceScope::Partitioned(pattern) => format!("arn:{}:{}", partition, pattern),
        }
    }
}
