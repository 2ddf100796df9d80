//! Service layer tying storage to configuration.
//!
//! `ErpService` wraps `ErpDb` with the audit failure policy and the sequence
//! defaults. All repo methods are implemented as `impl ErpService` blocks in
//! [`crate::repos`].

use std::time::Duration;

use erp_config::{AuditConfig, ErpConfig, SequenceConfig};
use erp_core::enums::AuditFailurePolicy;
use erp_core::sequence::SequenceTemplate;

use crate::ErpDb;
use crate::error::DatabaseError;
use crate::retry::RetryConfig;

/// Storage operations plus the policies that govern them.
pub struct ErpService {
    db: ErpDb,
    audit: AuditConfig,
    default_template: SequenceTemplate,
}

impl ErpService {
    /// Open the database named by `config.database` and apply its policies.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or the
    /// configured default template is invalid.
    pub async fn new_local(config: &ErpConfig) -> Result<Self, DatabaseError> {
        let db = ErpDb::open_local_with(
            &config.database.path,
            Duration::from_millis(config.database.busy_timeout_ms),
            RetryConfig::with_max_attempts(config.sequence.max_attempts),
        )
        .await?;
        Self::from_db(db, config.audit.clone(), &config.sequence)
    }

    /// Wrap an existing `ErpDb` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidState` if the default template is invalid.
    pub fn from_db(
        db: ErpDb,
        audit: AuditConfig,
        sequence: &SequenceConfig,
    ) -> Result<Self, DatabaseError> {
        let default_template = sequence
            .template()
            .map_err(|e| DatabaseError::InvalidState(e.to_string()))?;
        Ok(Self {
            db,
            audit,
            default_template,
        })
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &ErpDb {
        &self.db
    }

    #[must_use]
    pub const fn failure_policy(&self) -> AuditFailurePolicy {
        self.audit.failure_policy
    }

    #[must_use]
    pub const fn default_audit_limit(&self) -> u32 {
        self.audit.default_limit
    }

    #[must_use]
    pub const fn default_template(&self) -> &SequenceTemplate {
        &self.default_template
    }
}
