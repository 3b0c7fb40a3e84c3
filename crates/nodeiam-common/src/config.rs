//! ---
//! nodeiam_section: "01-core-functionality"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Shared primitives for node role composition."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

const MAX_ROLE_NAME_LEN: usize = 64;

/// Tri-state flags only count as enabled when explicitly set to `true`.
pub fn is_enabled(flag: Option<bool>) -> bool {
    flag == Some(true)
}

/// Cluster-wide IAM settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterIam {
    /// Workload identity federation through the cluster OIDC provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_oidc: Option<bool>,
}

/// Per-addon policy toggles. Unset entries are treated as disabled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AddonPolicies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_scaler: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_manager: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_dns: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_mesh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_mesh_preview: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsx: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alb_ingress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xray: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_builder: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_watch: Option<bool>,
}

/// IAM settings of a single node group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeGroupIam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_role_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_role_permissions_boundary: Option<String>,
    /// Managed policies attached instead of (or on top of) the default bundle.
    pub attach_policy_arns: Vec<String>,
    pub with_addon_policies: AddonPolicies,
}

impl NodeGroupIam {
    /// Validate structural invariants. Attach-list ARNs are parsed later by the resolver.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.instance_role_name {
            if name.trim().is_empty() {
                return Err(anyhow!("instance_role_name cannot be empty when set"));
            }
            if name.len() > MAX_ROLE_NAME_LEN {
                return Err(anyhow!(
                    "instance_role_name '{}' exceeds {} characters",
                    name,
                    MAX_ROLE_NAME_LEN
                ));
            }
        }
        if let Some(boundary) = &self.instance_role_permissions_boundary {
            if !boundary.starts_with("arn:") {
                return Err(anyhow!(
                    "instance_role_permissions_boundary '{}' is not an ARN",
                    boundary
                ));
            }
        }
        let mut seen = HashSet::new();
        for policy_arn in &self.attach_policy_arns {
            if !seen.insert(policy_arn.as_str()) {
                return Err(anyhow!(
                    "attach_policy_arns lists '{}' more than once",
                    policy_arn
                ));
            }
        }
        Ok(())
    }
}

/// Whether the node group is run by the managed node group API or self-managed.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroupKind {
    Managed,
    #[default]
    Unmanaged,
}

impl NodeGroupKind {
    pub fn is_managed(&self) -> bool {
        matches!(self, NodeGroupKind::Managed)
    }
}

/// AWS partition used when rendering ARNs and service principals.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    Aws,
    AwsCn,
    AwsUsGov,
    /// Render the `${AWS::Partition}` pseudo parameter for template substitution.
    #[default]
    Templated,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Aws => "aws",
            Partition::AwsCn => "aws-cn",
            Partition::AwsUsGov => "aws-us-gov",
            Partition::Templated => "${AWS::Partition}",
        }
    }

    /// DNS suffix for service principals in this partition.
    pub fn url_suffix(&self) -> &'static str {
        match self {
            Partition::Aws | Partition::AwsUsGov => "amazonaws.com",
            Partition::AwsCn => "amazonaws.com.cn",
            Partition::Templated => "${AWS::URLSuffix}",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Partition::Aws),
            "aws-cn" => Ok(Partition::AwsCn),
            "aws-us-gov" => Ok(Partition::AwsUsGov),
            "templated" => Ok(Partition::Templated),
            other => Err(format!("unknown partition: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// When set, a daily rolling JSON log file is written here.
    pub directory: Option<PathBuf>,
    pub format: LogFormat,
    pub file_prefix: Option<String>,
}

/// A complete role composition request as read from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoleRequest {
    #[serde(default)]
    pub cluster: ClusterIam,
    #[serde(default)]
    pub node_group: NodeGroupIam,
    #[serde(default)]
    pub kind: NodeGroupKind,
    #[serde(default)]
    pub enable_ssm: bool,
    #[serde(default)]
    pub partition: Partition,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`RoleRequest`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedRoleRequest {
    pub request: RoleRequest,
    pub source: PathBuf,
}

impl RoleRequest {
    pub const ENV_CONFIG_PATH: &str = "NODEIAM_CONFIG";

    /// Load a request from disk, respecting the `NODEIAM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.request)
    }

    /// Load a request from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedRoleRequest> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let request = Self::from_path(&path)?;
                return Ok(LoadedRoleRequest {
                    request,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let request = Self::from_path(&path)?;
                return Ok(LoadedRoleRequest {
                    request,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no role request files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading role request");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read role request {}", path.display()))?;
        let request = toml::from_str::<RoleRequest>(&contents)
            .with_context(|| format!("failed to parse role request {}", path.display()))?;
        request
            .validate()
            .with_context(|| format!("invalid role request {}", path.display()))?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        self.node_group.validate()
    }
}

impl std::str::FromStr for RoleRequest {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let request: RoleRequest =
            toml::from_str(content).with_context(|| "failed to parse role request")?;
        request.validate()?;
        Ok(request)
    }
}
