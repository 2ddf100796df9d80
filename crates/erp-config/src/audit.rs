//! Audit log behaviour.

use erp_core::enums::AuditFailurePolicy;
use serde::{Deserialize, Serialize};

/// Default number of rows returned by audit queries.
const fn default_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// `strict` fails the caller when an audit write fails, `best_effort`
    /// logs the failure and carries on.
    #[serde(default)]
    pub failure_policy: AuditFailurePolicy,

    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            failure_policy: AuditFailurePolicy::default(),
            default_limit: default_limit(),
        }
    }
}

impl AuditConfig {
    #[must_use]
    pub fn with_policy(failure_policy: AuditFailurePolicy) -> Self {
        Self {
            failure_policy,
            ..Self::default()
        }
    }
}
