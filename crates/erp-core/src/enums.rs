//! Enums shared across the ERP crates.
//!
//! All enums use `snake_case` serialization and expose `as_str()` for the
//! value stored in SQL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

/// Kind of change recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
}

impl AuditAction {
    pub const ALL: [Self; 4] = [Self::Create, Self::Update, Self::Delete, Self::View];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::View => "view",
        }
    }

    /// Whether this action carries a meaningful "before" snapshot.
    #[must_use]
    pub const fn has_before_state(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditFailurePolicy
// ---------------------------------------------------------------------------

/// What the change hook does when the audit write itself fails.
///
/// `Strict` surfaces the error to the caller so the enclosing operation can
/// abort. `BestEffort` logs the failure at `error` level and lets the caller
/// continue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AuditFailurePolicy {
    #[default]
    Strict,
    BestEffort,
}

impl AuditFailurePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::BestEffort => "best_effort",
        }
    }
}

impl fmt::Display for AuditFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
