//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
//! Inline allow policies for node addons.
//!
//! The permissions each addon needs live in [`ADDON_RULES`]; [`synthesize`]
//! walks that table in order and emits the statements of every enabled addon.
use nodeiam_common::{is_enabled, AddonPolicies};
use serde::Serialize;
use tracing::debug;

use crate::policy::ResourceScope;

/// Addons that contribute inline policies to the node role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Addon {
    AutoScaler,
    CertManager,
    ExternalDns,
    AppMesh,
    AppMeshPreview,
    Ebs,
    Fsx,
    Efs,
    AlbIngress,
    XRay,
}

impl Addon {
    fn flag(self, addons: &AddonPolicies) -> Option<bool> {
        match self {
            Addon::AutoScaler => addons.auto_scaler,
            Addon::CertManager => addons.cert_manager,
            Addon::ExternalDns => addons.external_dns,
            Addon::AppMesh => addons.app_mesh,
            Addon::AppMeshPreview => addons.app_mesh_preview,
            Addon::Ebs => addons.ebs,
            Addon::Fsx => addons.fsx,
            Addon::Efs => addons.efs,
            Addon::AlbIngress => addons.alb_ingress,
            Addon::XRay => addons.xray,
        }
    }

    pub fn is_enabled(self, addons: &AddonPolicies) -> bool {
        is_enabled(self.flag(addons))
    }
}

/// Static description of one inline policy.
#[derive(Debug)]
pub struct StatementSpec {
    pub name: &'static str,
    pub scope: ResourceScope,
    /// Action groups concatenated in order.
    pub actions: &'static [&'static [&'static str]],
    /// Extra actions appended when another addon is enabled as well.
    pub extend_with: Option<(Addon, &'static [&'static str])>,
}

impl StatementSpec {
    const fn new(
        name: &'static str,
        scope: ResourceScope,
        actions: &'static [&'static [&'static str]],
    ) -> Self {
        Self {
            name,
            scope,
            actions,
            extend_with: None,
        }
    }

    fn build(&self, addon: Addon, addons: &AddonPolicies) -> PolicyStatement {
        let mut actions: Vec<&'static str> =
            self.actions.iter().copied().flatten().copied().collect();
        if let Some((other, extra)) = self.extend_with {
            if other.is_enabled(addons) {
                actions.extend_from_slice(extra);
            }
        }
        PolicyStatement {
            name: self.name,
            addon,
            scope: self.scope,
            actions,
        }
    }
}

/// Table entry mapping an addon flag to its statements.
#[derive(Debug)]
pub struct AddonRule {
    pub addon: Addon,
    /// Addon whose enablement already covers this one.
    pub superseded_by: Option<Addon>,
    pub statements: &'static [StatementSpec],
}

impl AddonRule {
    fn applies(&self, addons: &AddonPolicies) -> bool {
        self.addon.is_enabled(addons)
            && !self
                .superseded_by
                .is_some_and(|other| other.is_enabled(addons))
    }
}

/// A named inline allow policy ready to attach to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    pub name: &'static str,
    pub addon: Addon,
    pub scope: ResourceScope,
    pub actions: Vec<&'static str>,
}

const HOSTED_ZONE: ResourceScope = ResourceScope::Partitioned("route53:::hostedzone/*");
const ROUTE53_CHANGE: ResourceScope = ResourceScope::Partitioned("route53:::change/*");
const SERVICE_LINKED_ROLE: ResourceScope =
    ResourceScope::Partitioned("iam::*:role/aws-service-role/*");

const AUTO_SCALER_ACTIONS: &[&str] = &[
    "autoscaling:DescribeAutoScalingGroups",
    "autoscaling:DescribeAutoScalingInstances",
    "autoscaling:DescribeLaunchConfigurations",
    "autoscaling:DescribeTags",
    "autoscaling:SetDesiredCapacity",
    "autoscaling:TerminateInstanceInAutoScalingGroup",
    "ec2:DescribeLaunchTemplateVersions",
];

const CHANGE_RECORD_SETS: &[&str] = &["route53:ChangeResourceRecordSets"];

const CERT_MANAGER_HOSTED_ZONE_ACTIONS: &[&str] = &[
    "route53:ListResourceRecordSets",
    "route53:ListHostedZonesByName",
];

/// Listing actions external-dns needs on top of what cert-manager gets.
const EXTERNAL_DNS_LISTING_EXTRA: &[&str] =
    &["route53:ListHostedZones", "route53:ListTagsForResource"];

const EXTERNAL_DNS_HOSTED_ZONE_ACTIONS: &[&str] = &[
    "route53:ListHostedZones",
    "route53:ListResourceRecordSets",
    "route53:ListTagsForResource",
];

const GET_CHANGE: &[&str] = &["route53:GetChange"];

const APP_MESH_BASE_ACTIONS: &[&str] = &[
    "servicediscovery:CreateService",
    "servicediscovery:DeleteService",
    "servicediscovery:GetService",
    "servicediscovery:GetInstance",
    "servicediscovery:RegisterInstance",
    "servicediscovery:DeregisterInstance",
    "servicediscovery:ListInstances",
    "servicediscovery:ListNamespaces",
    "servicediscovery:ListServices",
    "servicediscovery:GetInstancesHealthStatus",
    "servicediscovery:UpdateInstanceCustomHealthStatus",
    "servicediscovery:GetOperation",
    "route53:GetHealthCheck",
    "route53:CreateHealthCheck",
    "route53:UpdateHealthCheck",
    "route53:ChangeResourceRecordSets",
    "route53:DeleteHealthCheck",
];

const EBS_ACTIONS: &[&str] = &[
    "ec2:AttachVolume",
    "ec2:CreateSnapshot",
    "ec2:CreateTags",
    "ec2:CreateVolume",
    "ec2:DeleteSnapshot",
    "ec2:DeleteTags",
    "ec2:DeleteVolume",
    "ec2:DescribeAvailabilityZones",
    "ec2:DescribeInstances",
    "ec2:DescribeSnapshots",
    "ec2:DescribeTags",
    "ec2:DescribeVolumes",
    "ec2:DescribeVolumesModifications",
    "ec2:DetachVolume",
    "ec2:ModifyVolume",
];

const SERVICE_LINKED_ROLE_ACTIONS: &[&str] = &[
    "iam:CreateServiceLinkedRole",
    "iam:AttachRolePolicy",
    "iam:PutRolePolicy",
];

const EFS_EC2_ACTIONS: &[&str] = &[
    "ec2:DescribeSubnets",
    "ec2:CreateNetworkInterface",
    "ec2:DescribeNetworkInterfaces",
    "ec2:DeleteNetworkInterface",
    "ec2:ModifyNetworkInterfaceAttribute",
    "ec2:DescribeNetworkInterfaceAttribute",
];

// Mirrors the permission list documented for the AWS ALB ingress controller.
const ALB_INGRESS_ACTIONS: &[&str] = &[
    "acm:DescribeCertificate",
    "acm:ListCertificates",
    "acm:GetCertificate",
    "ec2:AuthorizeSecurityGroupIngress",
    "ec2:CreateSecurityGroup",
    "ec2:CreateTags",
    "ec2:DeleteTags",
    "ec2:DeleteSecurityGroup",
    "ec2:DescribeAccountAttributes",
    "ec2:DescribeAddresses",
    "ec2:DescribeInstances",
    "ec2:DescribeInstanceStatus",
    "ec2:DescribeInternetGateways",
    "ec2:DescribeNetworkInterfaces",
    "ec2:DescribeSecurityGroups",
    "ec2:DescribeSubnets",
    "ec2:DescribeTags",
    "ec2:DescribeVpcs",
    "ec2:ModifyInstanceAttribute",
    "ec2:ModifyNetworkInterfaceAttribute",
    "ec2:RevokeSecurityGroupIngress",
    "elasticloadbalancing:AddListenerCertificates",
    "elasticloadbalancing:AddTags",
    "elasticloadbalancing:CreateListener",
    "elasticloadbalancing:CreateLoadBalancer",
    "elasticloadbalancing:CreateRule",
    "elasticloadbalancing:CreateTargetGroup",
    "elasticloadbalancing:DeleteListener",
    "elasticloadbalancing:DeleteLoadBalancer",
    "elasticloadbalancing:DeleteRule",
    "elasticloadbalancing:DeleteTargetGroup",
    "elasticloadbalancing:DeregisterTargets",
    "elasticloadbalancing:DescribeListenerCertificates",
    "elasticloadbalancing:DescribeListeners",
    "elasticloadbalancing:DescribeLoadBalancers",
    "elasticloadbalancing:DescribeLoadBalancerAttributes",
    "elasticloadbalancing:DescribeRules",
    "elasticloadbalancing:DescribeSSLPolicies",
    "elasticloadbalancing:DescribeTags",
    "elasticloadbalancing:DescribeTargetGroups",
    "elasticloadbalancing:DescribeTargetGroupAttributes",
    "elasticloadbalancing:DescribeTargetHealth",
    "elasticloadbalancing:ModifyListener",
    "elasticloadbalancing:ModifyLoadBalancerAttributes",
    "elasticloadbalancing:ModifyRule",
    "elasticloadbalancing:ModifyTargetGroup",
    "elasticloadbalancing:ModifyTargetGroupAttributes",
    "elasticloadbalancing:RegisterTargets",
    "elasticloadbalancing:RemoveListenerCertificates",
    "elasticloadbalancing:RemoveTags",
    "elasticloadbalancing:SetIpAddressType",
    "elasticloadbalancing:SetSecurityGroups",
    "elasticloadbalancing:SetSubnets",
    "elasticloadbalancing:SetWebACL",
    "iam:CreateServiceLinkedRole",
    "iam:GetServerCertificate",
    "iam:ListServerCertificates",
    "waf-regional:GetWebACLForResource",
    "waf-regional:GetWebACL",
    "waf-regional:AssociateWebACL",
    "waf-regional:DisassociateWebACL",
    "tag:GetResources",
    "tag:TagResources",
    "waf:GetWebACL",
    "wafv2:GetWebACL",
    "wafv2:GetWebACLForResource",
    "wafv2:AssociateWebACL",
    "wafv2:DisassociateWebACL",
    "shield:DescribeProtection",
    "shield:GetSubscriptionState",
    "shield:DeleteProtection",
    "shield:CreateProtection",
    "shield:DescribeSubscription",
    "shield:ListProtections",
];

const XRAY_ACTIONS: &[&str] = &[
    "xray:PutTraceSegments",
    "xray:PutTelemetryRecords",
    "xray:GetSamplingRules",
    "xray:GetSamplingTargets",
    "xray:GetSamplingStatisticSummaries",
];

/// Addon policy table, in emission order.
pub static ADDON_RULES: &[AddonRule] = &[
    AddonRule {
        addon: Addon::AutoScaler,
        superseded_by: None,
        statements: &[StatementSpec::new(
            "PolicyAutoScaling",
            ResourceScope::Any,
            &[AUTO_SCALER_ACTIONS],
        )],
    },
    AddonRule {
        addon: Addon::CertManager,
        superseded_by: None,
        statements: &[
            StatementSpec::new("PolicyCertManagerChangeSet", HOSTED_ZONE, &[CHANGE_RECORD_SETS]),
            StatementSpec {
                name: "PolicyCertManagerHostedZones",
                scope: ResourceScope::Any,
                actions: &[CERT_MANAGER_HOSTED_ZONE_ACTIONS],
                extend_with: Some((Addon::ExternalDns, EXTERNAL_DNS_LISTING_EXTRA)),
            },
            StatementSpec::new("PolicyCertManagerGetChange", ROUTE53_CHANGE, &[GET_CHANGE]),
        ],
    },
    AddonRule {
        addon: Addon::ExternalDns,
        // cert-manager already grants the hosted zone policies external-dns needs.
        superseded_by: Some(Addon::CertManager),
        statements: &[
            StatementSpec::new("PolicyExternalDNSChangeSet", HOSTED_ZONE, &[CHANGE_RECORD_SETS]),
            StatementSpec::new(
                "PolicyExternalDNSHostedZones",
                ResourceScope::Any,
                &[EXTERNAL_DNS_HOSTED_ZONE_ACTIONS],
            ),
        ],
    },
    AddonRule {
        addon: Addon::AppMesh,
        superseded_by: None,
        statements: &[StatementSpec::new(
            "PolicyAppMesh",
            ResourceScope::Any,
            &[APP_MESH_BASE_ACTIONS, &["appmesh:*"]],
        )],
    },
    AddonRule {
        addon: Addon::AppMeshPreview,
        superseded_by: None,
        statements: &[StatementSpec::new(
            "PolicyAppMeshPreview",
            ResourceScope::Any,
            &[APP_MESH_BASE_ACTIONS, &["appmesh-preview:*"]],
        )],
    },
    AddonRule {
        addon: Addon::Ebs,
        superseded_by: None,
        statements: &[StatementSpec::new("PolicyEBS", ResourceScope::Any, &[EBS_ACTIONS])],
    },
    AddonRule {
        addon: Addon::Fsx,
        superseded_by: None,
        statements: &[
            StatementSpec::new("PolicyFSX", ResourceScope::Any, &[&["fsx:*"]]),
            StatementSpec::new(
                "PolicyServiceLinkRole",
                SERVICE_LINKED_ROLE,
                &[SERVICE_LINKED_ROLE_ACTIONS],
            ),
        ],
    },
    AddonRule {
        addon: Addon::Efs,
        superseded_by: None,
        statements: &[
            StatementSpec::new("PolicyEFS", ResourceScope::Any, &[&["elasticfilesystem:*"]]),
            StatementSpec::new("PolicyEFSEC2", ResourceScope::Any, &[EFS_EC2_ACTIONS]),
        ],
    },
    AddonRule {
        addon: Addon::AlbIngress,
        superseded_by: None,
        statements: &[StatementSpec::new(
            "PolicyALBIngress",
            ResourceScope::Any,
            &[ALB_INGRESS_ACTIONS],
        )],
    },
    AddonRule {
        addon: Addon::XRay,
        superseded_by: None,
        statements: &[StatementSpec::new("PolicyXRay", ResourceScope::Any, &[XRAY_ACTIONS])],
    },
];

/// Inline policy statements for every enabled addon, in table order.
pub fn synthesize(addons: &AddonPolicies) -> Vec<PolicyStatement> {
    ADDON_RULES
        .iter()
        .filter(|rule| rule.applies(addons))
        .flat_map(|rule| {
            rule.statements
                .iter()
                .map(move |spec| spec.build(rule.addon, addons))
        })
        .inspect(|statement| {
            debug!(
                addon = ?statement.addon,
                policy = statement.name,
                actions = statement.actions.len(),
                "synthesized addon policy"
            )
        })
        .collect()
}
