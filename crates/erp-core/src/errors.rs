//! Cross-cutting error types for the ERP.
//!
//! Storage errors (`DatabaseError`) and configuration errors (`ConfigError`)
//! live in their own crates. The binary converges everything into `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any ERP crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_kind} {id}")]
    NotFound { entity_kind: String, id: String },

    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
