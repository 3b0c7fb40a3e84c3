//! ---
//! nodeiam_section: "06-security-access-control"
//! nodeiam_subsection: "module"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Node role policy resolution and assembly."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

use crate::error::Result;
use crate::role::RoleDefinition;

/// Role assembly metrics exported via Prometheus.
#[derive(Clone)]
pub struct RoleMetrics {
    registry: Arc<Registry>,
    roles_assembled_total: IntCounter,
    policy_statements_total: IntCounter,
    resolution_failures_total: IntCounter,
}

impl RoleMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let roles_assembled_total = IntCounter::new(
            "nodeiam_roles_assembled_total",
            "Node instance roles successfully planned",
        )?;
        let policy_statements_total = IntCounter::new(
            "nodeiam_policy_statements_total",
            "Inline addon policy statements synthesized",
        )?;
        let resolution_failures_total = IntCounter::new(
            "nodeiam_resolution_failures_total",
            "Role requests rejected during managed policy resolution",
        )?;

        registry.register(Box::new(roles_assembled_total.clone()))?;
        registry.register(Box::new(policy_statements_total.clone()))?;
        registry.register(Box::new(resolution_failures_total.clone()))?;

        Ok(Self {
            registry,
            roles_assembled_total,
            policy_statements_total,
            resolution_failures_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Count the outcome of a [`plan_role`](crate::role::plan_role) call.
    pub fn observe(&self, outcome: &Result<RoleDefinition>) {
        match outcome {
            Ok(definition) => {
                self.roles_assembled_total.inc();
                self.policy_statements_total
                    .inc_by(definition.statements.len() as u64);
            }
            Err(_) => self.resolution_failures_total.inc(),
        }
    }

    pub fn roles_assembled(&self) -> u64 {
        self.roles_assembled_total.get()
    }

    pub fn policy_statements(&self) -> u64 {
        self.policy_statements_total.get()
    }

    pub fn resolution_failures(&self) -> u64 {
        self.resolution_failures_total.get()
    }
}
