//! System settings repository.
//!
//! A key/value store (`ACADEMIC_YEAR`, `LATE_FEE_AMOUNT`, ...) whose writes go
//! through the audit change hook.

use chrono::Utc;

use erp_core::entities::Setting;
use erp_core::errors::CoreError;
use erp_core::snapshot::Auditable;

use crate::error::DatabaseError;
use crate::helpers::{format_timestamp, parse_datetime};
use crate::repos::audit::Change;
use crate::service::ErpService;

const MAX_KEY_LEN: usize = 100;

const SETTING_COLUMNS: &str = "id, key, value, description, created_at, updated_at";

fn validate_key(key: &str) -> Result<(), CoreError> {
    if key.trim().is_empty() || key.len() > MAX_KEY_LEN {
        return Err(CoreError::Validation(format!(
            "setting key must be 1-{MAX_KEY_LEN} characters, got '{key}'"
        )));
    }
    Ok(())
}

fn row_to_setting(row: &libsql::Row) -> Result<Setting, DatabaseError> {
    Ok(Setting {
        id: row.get::<i64>(0)?,
        key: row.get::<String>(1)?,
        value: row.get::<String>(2)?,
        description: row.get::<String>(3)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
        updated_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

impl ErpService {
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn get_setting(&self, key: &str) -> Result<Option<Setting>, DatabaseError> {
        let row = self
            .db()
            .query_row_with(
                &format!("SELECT {SETTING_COLUMNS} FROM settings WHERE key = ?1"),
                || [key],
            )
            .await?;
        row.as_ref().map(row_to_setting).transpose()
    }

    /// The value for `key`, or `default` when it is not set.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn get_setting_or(&self, key: &str, default: &str) -> Result<String, DatabaseError> {
        Ok(self
            .get_setting(key)
            .await?
            .map_or_else(|| default.to_string(), |s| s.value))
    }

    /// Create or update a setting and record the change.
    ///
    /// An empty `description` keeps the stored one. The old row is read in
    /// the same transaction as the write, so the recorded before state is the
    /// value this write replaced.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` for an invalid key, `DatabaseError` if
    /// the write fails, and `DatabaseError::AuditWrite` if the audit entry
    /// cannot be written under the strict policy. The setting write is not
    /// undone in that case.
    pub async fn set_setting(
        &self,
        key: &str,
        value: &str,
        description: &str,
    ) -> Result<Setting, DatabaseError> {
        validate_key(key)?;
        let now = format_timestamp(&Utc::now());

        let txn = self.db().begin_write().await?;
        let before = txn
            .query_row(
                &format!("SELECT {SETTING_COLUMNS} FROM settings WHERE key = ?1"),
                [key],
            )
            .await?
            .as_ref()
            .map(row_to_setting)
            .transpose()?;
        let row = txn
            .query_row(
                &format!(
                    "INSERT INTO settings (key, value, description, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         description = CASE WHEN excluded.description = ''
                             THEN settings.description ELSE excluded.description END,
                         updated_at = excluded.updated_at
                     RETURNING {SETTING_COLUMNS}"
                ),
                libsql::params![key, value, description, now.as_str()],
            )
            .await?
            .ok_or(DatabaseError::NoResult)?;
        let setting = row_to_setting(&row)?;
        txn.commit().await?;

        let change = match before {
            Some(before) => Change::Updated {
                before: Some(before.snapshot()),
            },
            None => Change::Created,
        };
        self.record_change(&setting, change).await?;
        tracing::debug!(key, "setting saved");
        Ok(setting)
    }

    /// Insert a setting unless the key already exists.
    ///
    /// Returns the stored setting and whether it was created. Only a created
    /// setting is recorded in the audit log.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the write or the audit entry fails.
    pub async fn ensure_setting(
        &self,
        key: &str,
        value: &str,
        description: &str,
    ) -> Result<(Setting, bool), DatabaseError> {
        validate_key(key)?;
        let now = format_timestamp(&Utc::now());
        let inserted = self
            .db()
            .query_row_with(
                &format!(
                    "INSERT INTO settings (key, value, description, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(key) DO NOTHING
                     RETURNING {SETTING_COLUMNS}"
                ),
                || libsql::params![key, value, description, now.as_str()],
            )
            .await?;

        if let Some(row) = inserted {
            let setting = row_to_setting(&row)?;
            self.record_change(&setting, Change::Created).await?;
            return Ok((setting, true));
        }
        let existing = self.get_setting(key).await?.ok_or(DatabaseError::NoResult)?;
        Ok((existing, false))
    }

    /// All settings, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_settings(&self) -> Result<Vec<Setting>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {SETTING_COLUMNS} FROM settings ORDER BY key"),
                || (),
            )
            .await?;
        let mut settings = Vec::new();
        while let Some(row) = rows.next().await? {
            settings.push(row_to_setting(&row)?);
        }
        Ok(settings)
    }
}
