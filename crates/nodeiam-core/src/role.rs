//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
//! Node instance role assembly.
//!
//! [`plan_role`] computes the whole role without side effects and
//! [`create_role`] hands the plan to a [`TemplateBuilder`]. Every fallible step
//! happens while planning, so a failed request never registers anything.
use nodeiam_common::{ClusterIam, NodeGroupIam, NodeGroupKind, Partition};
use serde::Serialize;
use tracing::info;

use crate::addons::{synthesize, PolicyStatement};
use crate::error::Result;
use crate::managed::resolve_managed_policies;
use crate::metrics::RoleMetrics;
use crate::policy::{service_principal, PolicyDocument};
use crate::template::{ResourceRef, RoleResource, TemplateBuilder};

/// Logical id of the node instance role inside the template.
pub const INSTANCE_ROLE_RESOURCE: &str = "NodeInstanceRole";
pub const ROLE_PATH: &str = "/";

const INSTANCE_SERVICE: &str = "ec2";

/// Everything needed to emit a node instance role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub trust_policy: PolicyDocument,
    pub path: String,
    pub role_name: Option<String>,
    pub permissions_boundary: Option<String>,
    pub managed_policy_arns: Vec<String>,
    pub statements: Vec<PolicyStatement>,
}

impl RoleDefinition {
    pub fn resource(&self) -> RoleResource {
        RoleResource {
            path: self.path.clone(),
            assume_role_policy_document: self.trust_policy.clone(),
            managed_policy_arns: self.managed_policy_arns.clone(),
            role_name: self.role_name.clone(),
            permissions_boundary: self.permissions_boundary.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Resolve managed policies and addon statements into a [`RoleDefinition`].
pub fn plan_role(
    cluster: &ClusterIam,
    node_group: &NodeGroupIam,
    kind: NodeGroupKind,
    enable_ssm: bool,
    partition: Partition,
) -> Result<RoleDefinition> {
    let managed = resolve_managed_policies(cluster, node_group, kind, enable_ssm)?;
    Ok(RoleDefinition {
        trust_policy: PolicyDocument::assume_role_for_services(vec![service_principal(
            INSTANCE_SERVICE,
            partition,
        )]),
        path: ROLE_PATH.to_owned(),
        role_name: non_empty(&node_group.instance_role_name),
        permissions_boundary: non_empty(&node_group.instance_role_permissions_boundary),
        managed_policy_arns: managed.to_arns(partition),
        statements: synthesize(&node_group.with_addon_policies),
    })
}

/// Register a planned role and its addon policies with `template`.
pub fn emit_role<T>(template: &mut T, definition: &RoleDefinition) -> ResourceRef
where
    T: TemplateBuilder + ?Sized,
{
    let role = template.new_resource(INSTANCE_ROLE_RESOURCE, definition.resource());
    for statement in &definition.statements {
        template.attach_allow_policy(statement.name, &role, &statement.scope, &statement.actions);
    }
    info!(
        role = %role,
        managed_policies = definition.managed_policy_arns.len(),
        inline_policies = definition.statements.len(),
        "node instance role assembled"
    );
    role
}

/// Create the node instance role with the policies required by the node and its addons.
///
/// When `metrics` is given the planning outcome is counted, failures included.
pub fn create_role<T>(
    template: &mut T,
    cluster: &ClusterIam,
    node_group: &NodeGroupIam,
    kind: NodeGroupKind,
    enable_ssm: bool,
    metrics: Option<&RoleMetrics>,
) -> Result<ResourceRef>
where
    T: TemplateBuilder + ?Sized,
{
    let outcome = plan_role(cluster, node_group, kind, enable_ssm, template.partition());
    if let Some(metrics) = metrics {
        metrics.observe(&outcome);
    }
    Ok(emit_role(template, &outcome?))
}
