//! ---
//! nodeiam_section: "01-core-functionality"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Shared primitives for node role composition."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
//! Shared primitives for the node IAM workspace.
//! This crate exposes the role request model, configuration loading and
//! tracing initialisation consumed by the core library and the CLI.

pub mod config;
pub mod logging;

pub use config::{
    is_enabled, AddonPolicies, ClusterIam, LoadedRoleRequest, LoggingConfig, NodeGroupIam,
    NodeGroupKind, Partition, RoleRequest,
};
pub use logging::{init_tracing, LogFormat};
