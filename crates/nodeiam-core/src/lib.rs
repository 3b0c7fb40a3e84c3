//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
//! IAM configuration for cluster worker nodes: managed policy resolution,
//! addon policy synthesis and assembly of the node instance role.

pub mod addons;
pub mod arn;
pub mod error;
pub mod managed;
pub mod metrics;
pub mod policy;
pub mod role;
pub mod template;

pub use addons::{synthesize, Addon, PolicyStatement};
pub use arn::{normalize_arn, Arn, ArnError};
pub use error::{IamError, Result};
pub use managed::{resolve_managed_policies, ManagedPolicyName, PolicyNameSet, ResolvedPolicies};
pub use metrics::RoleMetrics;
pub use policy::{PolicyDocument, ResourceScope};
pub use role::{create_role, emit_role, plan_role, RoleDefinition, INSTANCE_ROLE_RESOURCE};
pub use template::{AllowPolicy, InMemoryTemplate, ResourceRef, RoleResource, TemplateBuilder};
