//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
//! Managed policy resolution for node roles.
//!
//! Defaults are tracked by short policy name and only turned into ARNs when the
//! role is emitted, so an explicitly attached ARN can knock out the default it
//! overlaps with.
use std::collections::BTreeMap;

use indexmap::IndexSet;
use nodeiam_common::{is_enabled, ClusterIam, NodeGroupIam, NodeGroupKind, Partition};
use serde::Serialize;
use tracing::{debug, warn};

use crate::arn::{Arn, ArnError};
use crate::error::{IamError, Result};

/// AWS managed policies a node role may receive by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ManagedPolicyName {
    EksWorkerNode,
    EksCni,
    ContainerRegistryReadOnly,
    ContainerRegistryPowerUser,
    SsmManagedInstanceCore,
    CloudWatchAgentServer,
}

impl ManagedPolicyName {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ManagedPolicyName::EksWorkerNode => "AmazonEKSWorkerNodePolicy",
            ManagedPolicyName::EksCni => "AmazonEKS_CNI_Policy",
            ManagedPolicyName::ContainerRegistryReadOnly => "AmazonEC2ContainerRegistryReadOnly",
            ManagedPolicyName::ContainerRegistryPowerUser => "AmazonEC2ContainerRegistryPowerUser",
            ManagedPolicyName::SsmManagedInstanceCore => "AmazonSSMManagedInstanceCore",
            ManagedPolicyName::CloudWatchAgentServer => "CloudWatchAgentServerPolicy",
        }
    }

    pub fn arn(&self, partition: Partition) -> String {
        format!("arn:{}:iam::aws:policy/{}", partition, self.as_str())
    }
}

/// Policies every node role starts from when no attach list is given.
pub const DEFAULT_NODE_POLICIES: &[ManagedPolicyName] = &[ManagedPolicyName::EksWorkerNode];

/// Ordered set of managed policies keyed by short name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyNameSet {
    entries: BTreeMap<&'static str, ManagedPolicyName>,
}

impl PolicyNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, policy: ManagedPolicyName) {
        debug!(policy = policy.as_str(), "including managed policy");
        self.entries.insert(policy.as_str(), policy);
    }

    /// Remove the entry whose short name equals `name`. Returns whether one was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn contains(&self, policy: ManagedPolicyName) -> bool {
        self.entries.contains_key(policy.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in lexicographic order of their short names.
    pub fn iter(&self) -> impl Iterator<Item = ManagedPolicyName> + '_ {
        self.entries.values().copied()
    }
}

impl Extend<ManagedPolicyName> for PolicyNameSet {
    fn extend<I: IntoIterator<Item = ManagedPolicyName>>(&mut self, iter: I) {
        for policy in iter {
            self.insert(policy);
        }
    }
}

/// Outcome of managed policy resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicies {
    explicit: Vec<String>,
    defaults: PolicyNameSet,
}

impl ResolvedPolicies {
    /// Caller supplied ARNs, first occurrence order.
    pub fn explicit(&self) -> &[String] {
        &self.explicit
    }

    pub fn defaults(&self) -> &PolicyNameSet {
        &self.defaults
    }

    /// Explicit ARNs followed by the remaining defaults rendered for `partition`.
    pub fn to_arns(&self, partition: Partition) -> Vec<String> {
        let mut arns: IndexSet<String> = self.explicit.iter().cloned().collect();
        arns.extend(self.defaults.iter().map(|policy| policy.arn(partition)));
        arns.into_iter().collect()
    }
}

/// Compute the managed policies for a node role.
///
/// Fails without a partial result when an attached ARN has no resource name.
pub fn resolve_managed_policies(
    cluster: &ClusterIam,
    node_group: &NodeGroupIam,
    kind: NodeGroupKind,
    enable_ssm: bool,
) -> Result<ResolvedPolicies> {
    let addons = &node_group.with_addon_policies;
    let mut defaults = PolicyNameSet::new();

    if node_group.attach_policy_arns.is_empty() {
        defaults.extend(DEFAULT_NODE_POLICIES.iter().copied());
        if !is_enabled(cluster.with_oidc) {
            defaults.insert(ManagedPolicyName::EksCni);
        }
        if kind.is_managed() {
            // Required by the managed node group API even when the power user
            // policy already grants a superset of its actions.
            defaults.insert(ManagedPolicyName::ContainerRegistryReadOnly);
        }
    }

    if enable_ssm {
        defaults.insert(ManagedPolicyName::SsmManagedInstanceCore);
    }

    if is_enabled(addons.image_builder) {
        defaults.insert(ManagedPolicyName::ContainerRegistryPowerUser);
    } else if !kind.is_managed() {
        // Self-managed groups keep registry pull access even with an explicit attach list.
        defaults.insert(ManagedPolicyName::ContainerRegistryReadOnly);
    }

    if is_enabled(addons.cloud_watch) {
        defaults.insert(ManagedPolicyName::CloudWatchAgentServer);
    }

    let mut explicit = IndexSet::new();
    for policy_arn in &node_group.attach_policy_arns {
        let name = attached_policy_name(policy_arn)?;
        if defaults.remove(&name) {
            debug!(policy = %name, arn = %policy_arn, "attached ARN replaces default policy");
        }
        explicit.insert(policy_arn.clone());
    }

    Ok(ResolvedPolicies {
        explicit: explicit.into_iter().collect(),
        defaults,
    })
}

fn attached_policy_name(policy_arn: &str) -> Result<String> {
    let malformed = |reason: ArnError| {
        warn!(arn = %policy_arn, %reason, "rejecting attached policy ARN");
        IamError::MalformedArn {
            arn: policy_arn.to_owned(),
            reason,
        }
    };
    let parsed: Arn = policy_arn.parse().map_err(malformed)?;
    let name = parsed.resource_name().map_err(malformed)?;
    Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeiam_common::AddonPolicies;

    const WORKER_ARN: &str = "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy";
    const READ_ONLY_ARN: &str = "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly";
    const CUSTOM_ARN: &str = "arn:aws:iam::123456789012:policy/team/CustomNodePolicy";

    fn oidc(enabled: bool) -> ClusterIam {
        ClusterIam {
            with_oidc: Some(enabled),
        }
    }

    fn names(resolved: &ResolvedPolicies) -> Vec<&'static str> {
        resolved.defaults().iter().map(|p| p.as_str()).collect()
    }

    #[test]
    fn unmanaged_defaults_without_oidc() {
        let resolved = resolve_managed_policies(
            &oidc(false),
            &NodeGroupIam::default(),
            NodeGroupKind::Unmanaged,
            false,
        )
        .unwrap();
        assert_eq!(
            names(&resolved),
            vec![
                "AmazonEC2ContainerRegistryReadOnly",
                "AmazonEKSWorkerNodePolicy",
                "AmazonEKS_CNI_Policy",
            ]
        );
        assert!(resolved.explicit().is_empty());
    }

    #[test]
    fn oidc_drops_cni_policy() {
        let resolved = resolve_managed_policies(
            &oidc(true),
            &NodeGroupIam::default(),
            NodeGroupKind::Unmanaged,
            false,
        )
        .unwrap();
        assert!(!resolved.defaults().contains(ManagedPolicyName::EksCni));
        let unset = resolve_managed_policies(
            &ClusterIam::default(),
            &NodeGroupIam::default(),
            NodeGroupKind::Unmanaged,
            false,
        )
        .unwrap();
        assert!(unset.defaults().contains(ManagedPolicyName::EksCni));
    }

    #[test]
    fn managed_keeps_read_only_alongside_power_user() {
        let iam = NodeGroupIam {
            with_addon_policies: AddonPolicies {
                image_builder: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(false), &iam, NodeGroupKind::Managed, false).unwrap();
        assert!(resolved
            .defaults()
            .contains(ManagedPolicyName::ContainerRegistryReadOnly));
        assert!(resolved
            .defaults()
            .contains(ManagedPolicyName::ContainerRegistryPowerUser));
    }

    #[test]
    fn image_builder_replaces_read_only_for_unmanaged() {
        let iam = NodeGroupIam {
            with_addon_policies: AddonPolicies {
                image_builder: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(false), &iam, NodeGroupKind::Unmanaged, false)
                .unwrap();
        assert!(!resolved
            .defaults()
            .contains(ManagedPolicyName::ContainerRegistryReadOnly));
        assert!(resolved
            .defaults()
            .contains(ManagedPolicyName::ContainerRegistryPowerUser));
    }

    #[test]
    fn unmanaged_attach_list_still_gets_read_only() {
        let iam = NodeGroupIam {
            attach_policy_arns: vec![CUSTOM_ARN.into()],
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(false), &iam, NodeGroupKind::Unmanaged, false)
                .unwrap();
        assert_eq!(names(&resolved), vec!["AmazonEC2ContainerRegistryReadOnly"]);
        assert_eq!(
            resolved.to_arns(Partition::Aws),
            vec![CUSTOM_ARN.to_string(), READ_ONLY_ARN.to_string()]
        );
    }

    #[test]
    fn managed_attach_list_skips_defaults() {
        let iam = NodeGroupIam {
            attach_policy_arns: vec![CUSTOM_ARN.into()],
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(false), &iam, NodeGroupKind::Managed, false).unwrap();
        assert!(resolved.defaults().is_empty());
        assert_eq!(resolved.to_arns(Partition::Aws), vec![CUSTOM_ARN.to_string()]);
    }

    #[test]
    fn explicit_arn_overrides_matching_default() {
        let iam = NodeGroupIam {
            attach_policy_arns: vec![WORKER_ARN.into(), READ_ONLY_ARN.into()],
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(false), &iam, NodeGroupKind::Unmanaged, true).unwrap();
        assert!(!resolved
            .defaults()
            .contains(ManagedPolicyName::ContainerRegistryReadOnly));
        assert_eq!(
            resolved.to_arns(Partition::Templated),
            vec![
                WORKER_ARN.to_string(),
                READ_ONLY_ARN.to_string(),
                "arn:${AWS::Partition}:iam::aws:policy/AmazonSSMManagedInstanceCore".to_string(),
            ]
        );
    }

    #[test]
    fn ssm_and_cloud_watch_are_added() {
        let iam = NodeGroupIam {
            with_addon_policies: AddonPolicies {
                cloud_watch: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(true), &iam, NodeGroupKind::Managed, true).unwrap();
        assert_eq!(
            names(&resolved),
            vec![
                "AmazonEC2ContainerRegistryReadOnly",
                "AmazonEKSWorkerNodePolicy",
                "AmazonSSMManagedInstanceCore",
                "CloudWatchAgentServerPolicy",
            ]
        );
    }

    #[test]
    fn malformed_attach_arn_fails() {
        for bad in [
            "arn:aws:iam::123456789012:role",
            "arn:aws:iam::123456789012:policy/",
            "not-an-arn",
        ] {
            let iam = NodeGroupIam {
                attach_policy_arns: vec![WORKER_ARN.into(), bad.into()],
                ..Default::default()
            };
            let err = resolve_managed_policies(&oidc(false), &iam, NodeGroupKind::Managed, false)
                .unwrap_err();
            match err {
                IamError::MalformedArn { arn, .. } => assert_eq!(arn, bad),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn duplicate_explicit_arns_collapse() {
        let iam = NodeGroupIam {
            attach_policy_arns: vec![CUSTOM_ARN.into(), CUSTOM_ARN.into()],
            ..Default::default()
        };
        let resolved =
            resolve_managed_policies(&oidc(true), &iam, NodeGroupKind::Managed, false).unwrap();
        assert_eq!(resolved.explicit(), &[CUSTOM_ARN.to_string()]);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_flag() -> impl Strategy<Value = Option<bool>> {
            prop_oneof![Just(None), Just(Some(false)), Just(Some(true))]
        }

        fn arb_attach() -> impl Strategy<Value = Vec<String>> {
            proptest::sample::subsequence(
                vec![
                    WORKER_ARN.to_string(),
                    READ_ONLY_ARN.to_string(),
                    CUSTOM_ARN.to_string(),
                ],
                0..=3,
            )
        }

        proptest! {
            #[test]
            fn resolution_is_deterministic(
                with_oidc in arb_flag(),
                image_builder in arb_flag(),
                cloud_watch in arb_flag(),
                managed in any::<bool>(),
                enable_ssm in any::<bool>(),
                attach in arb_attach(),
            ) {
                let cluster = ClusterIam { with_oidc };
                let iam = NodeGroupIam {
                    attach_policy_arns: attach,
                    with_addon_policies: AddonPolicies {
                        image_builder,
                        cloud_watch,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let kind = if managed { NodeGroupKind::Managed } else { NodeGroupKind::Unmanaged };
                let first = resolve_managed_policies(&cluster, &iam, kind, enable_ssm).unwrap();
                let second = resolve_managed_policies(&cluster, &iam, kind, enable_ssm).unwrap();
                prop_assert_eq!(first.to_arns(Partition::Aws), second.to_arns(Partition::Aws));

                let arns = first.to_arns(Partition::Aws);
                let unique: IndexSet<&String> = arns.iter().collect();
                prop_assert_eq!(unique.len(), arns.len());

                if managed && iam.attach_policy_arns.is_empty() {
                    prop_assert!(arns.iter().any(|arn| arn == READ_ONLY_ARN));
                }
                if !managed && !nodeiam_common::is_enabled(image_builder) {
                    prop_assert!(arns.iter().any(|arn| arn == READ_ONLY_ARN));
                }
            }
        }
    }
}
