//! Database error types for erp-db.

use erp_core::errors::CoreError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The audit entry could not be persisted.
    #[error("Audit write failed for {target}: {reason}")]
    AuditWrite { target: String, reason: String },

    /// No reference number could be issued. The counter is unchanged.
    #[error("Sequence generation failed for {prefix}/{year}: {reason}")]
    SequenceGeneration {
        prefix: String,
        year: i32,
        reason: String,
    },

    /// Input rejected by a core validation rule.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
