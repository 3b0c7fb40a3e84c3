//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use nodeiam_common::Partition;
use serde::Serialize;

use crate::policy::{PolicyDocument, ResourceScope};

/// Opaque handle to a resource registered with a [`TemplateBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(logical_id: impl Into<String>) -> Self {
        Self(logical_id.into())
    }

    pub fn logical_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// IAM role resource definition handed to the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleResource {
    pub path: String,
    pub assume_role_policy_document: PolicyDocument,
    pub managed_policy_arns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_boundary: Option<String>,
}

/// Inline allow policy attached to one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllowPolicy {
    pub policy_name: String,
    pub roles: Vec<ResourceRef>,
    pub policy_document: PolicyDocument,
}

/// Sink for the resources making up a node role.
pub trait TemplateBuilder {
    /// Partition used to render ARNs at emission time.
    fn partition(&self) -> Partition;

    /// Register `role` under the logical id `name`.
    fn new_resource(&mut self, name: &str, role: RoleResource) -> ResourceRef;

    /// Attach an inline allow policy named `name` to `role`. Names are unique per
    /// template; attaching the same name again replaces the earlier policy.
    fn attach_allow_policy(
        &mut self,
        name: &str,
        role: &ResourceRef,
        scope: &ResourceScope,
        actions: &[&str],
    );
}

/// [`TemplateBuilder`] that records everything in insertion order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InMemoryTemplate {
    #[serde(skip)]
    partition: Partition,
    resources: IndexMap<String, RoleResource>,
    policies: IndexMap<String, AllowPolicy>,
}

impl InMemoryTemplate {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            ..Self::default()
        }
    }

    pub fn role(&self, role: &ResourceRef) -> Option<&RoleResource> {
        self.resources.get(role.logical_id())
    }

    pub fn resources(&self) -> &IndexMap<String, RoleResource> {
        &self.resources
    }

    pub fn policy(&self, name: &str) -> Option<&AllowPolicy> {
        self.policies.get(name)
    }

    pub fn policies(&self) -> &IndexMap<String, AllowPolicy> {
        &self.policies
    }

    pub fn policies_for<'a>(
        &'a self,
        role: &'a ResourceRef,
    ) -> impl Iterator<Item = &'a AllowPolicy> + 'a {
        self.policies
            .values()
            .filter(move |policy| policy.roles.contains(role))
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.policies.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

impl TemplateBuilder for InMemoryTemplate {
    fn partition(&self) -> Partition {
        self.partition
    }

    fn new_resource(&mut self, name: &str, role: RoleResource) -> ResourceRef {
        self.resources.insert(name.to_owned(), role);
        ResourceRef::new(name)
    }

    fn attach_allow_policy(
        &mut self,
        name: &str,
        role: &ResourceRef,
        scope: &ResourceScope,
        actions: &[&str],
    ) {
        let policy = AllowPolicy {
            policy_name: name.to_owned(),
            roles: vec![role.clone()],
            policy_document: PolicyDocument::allow(scope.render(self.partition), actions),
        };
        self.policies.insert(name.to_owned(), policy);
    }
}
