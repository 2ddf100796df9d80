//! Number sequence repository.
//!
//! Issues human-readable reference codes (`RCPT/2025/00042`) from one counter
//! per `(prefix, year)`. The get-or-create and the increment are a single
//! upsert, so concurrent first callers share one row and every caller gets a
//! distinct number. A statement that fails changes nothing.
//!
//! Each prefix has exactly one definition fixing its template and whether it
//! resets yearly. It is pinned on first use when the operator never defined
//! one, and once counters exist only its description may change. Together
//! with the template layout rules this keeps every issued code unique.

use chrono::{Datelike, Utc};

use erp_core::entities::{IssuedNumber, SequenceCounter, SequenceDefinition};
use erp_core::errors::CoreError;
use erp_core::sequence::{SequenceScope, SequenceTemplate, is_prefix_char};
use erp_core::snapshot::Auditable;

use crate::error::DatabaseError;
use crate::helpers::{format_timestamp, get_i32, parse_datetime};
use crate::repos::audit::Change;
use crate::service::ErpService;

const MAX_PREFIX_LEN: usize = 10;
const MAX_YEAR: i32 = 9999;

const COUNTER_COLUMNS: &str =
    "prefix, year, current_number, format_template, description, created_at, updated_at";

const DEFINITION_COLUMNS: &str = "id, prefix, format_template, description, reset_yearly";

/// Check a prefix against the counter key rules: 1 to 10 characters from
/// `[A-Za-z0-9_]`.
///
/// # Errors
///
/// Returns `CoreError::Validation` for an empty, long or ill-formed prefix.
pub fn validate_prefix(prefix: &str) -> Result<(), CoreError> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
        return Err(CoreError::Validation(format!(
            "sequence prefix must be 1-{MAX_PREFIX_LEN} characters, got '{prefix}'"
        )));
    }
    if let Some(bad) = prefix.chars().find(|c| !is_prefix_char(*c)) {
        return Err(CoreError::Validation(format!(
            "sequence prefix '{prefix}' contains invalid character '{bad}'"
        )));
    }
    Ok(())
}

fn validate_year(year: i32) -> Result<(), CoreError> {
    if (1..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "sequence year must be between 1 and {MAX_YEAR}, got {year}"
        )))
    }
}

/// Yearly counters restart every year, so the year must be part of the code.
fn check_scope(template: &SequenceTemplate, scope: SequenceScope) -> Result<(), CoreError> {
    if matches!(scope, SequenceScope::Yearly(_)) && !template.includes_year() {
        return Err(CoreError::Validation(format!(
            "template '{template}' resets yearly but has no {{year}} placeholder"
        )));
    }
    Ok(())
}

const fn scope_name(reset_yearly: bool) -> &'static str {
    if reset_yearly { "yearly" } else { "perpetual" }
}

fn row_to_counter(row: &libsql::Row) -> Result<SequenceCounter, DatabaseError> {
    Ok(SequenceCounter {
        prefix: row.get::<String>(0)?,
        year: get_i32(row, 1)?,
        current_number: row.get::<i64>(2)?,
        format_template: row.get::<String>(3)?,
        description: row.get::<String>(4)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

fn row_to_definition(row: &libsql::Row) -> Result<SequenceDefinition, DatabaseError> {
    Ok(SequenceDefinition {
        id: row.get::<i64>(0)?,
        prefix: row.get::<String>(1)?,
        format_template: row.get::<String>(2)?,
        description: row.get::<String>(3)?,
        reset_yearly: row.get::<i64>(4)? != 0,
    })
}

impl ErpService {
    /// Issue the next number for `prefix`.
    ///
    /// `year` defaults to the current UTC year. With `reset_yearly` the
    /// counter is keyed by `(prefix, year)` and restarts at 1 each year;
    /// without it one perpetual counter serves every year and the requested
    /// year is only rendered into the code.
    ///
    /// A prefix without a definition is pinned to the configured default
    /// template and to the `reset_yearly` of this first call. Later calls
    /// must ask for the same scope.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` for an invalid prefix, year or template,
    /// or a `reset_yearly` that differs from the prefix's definition, and
    /// `DatabaseError::SequenceGeneration` when the counter cannot be
    /// advanced. The counter is unchanged in every case.
    pub async fn next_number(
        &self,
        prefix: &str,
        year: Option<i32>,
        reset_yearly: bool,
    ) -> Result<IssuedNumber, DatabaseError> {
        validate_prefix(prefix)?;
        let year = year.unwrap_or_else(|| Utc::now().year());
        validate_year(year)?;
        let scope = SequenceScope::new(year, reset_yearly);

        let definition = match self.get_sequence_definition(prefix).await? {
            Some(def) => def,
            None => self.pin_sequence(prefix, reset_yearly).await?,
        };
        if definition.reset_yearly != reset_yearly {
            return Err(CoreError::Validation(format!(
                "sequence '{prefix}' is {}, cannot issue a {} number",
                scope_name(definition.reset_yearly),
                scope_name(reset_yearly)
            ))
            .into());
        }
        let template = SequenceTemplate::parse(&definition.format_template)?;
        check_scope(&template, scope)?;

        let fail = |reason: String| DatabaseError::SequenceGeneration {
            prefix: prefix.to_string(),
            year,
            reason,
        };

        // Template and scope are read from the definition inside the
        // statement, so a concurrent redefinition cannot split them.
        let now = format_timestamp(&Utc::now());
        let row = self
            .db()
            .query_row_with(
                "INSERT INTO number_sequences
                     (prefix, year, current_number, format_template, description, created_at, updated_at)
                 SELECT d.prefix, ?2, 1, d.format_template, d.description, ?4, ?4
                 FROM sequence_definitions d
                 WHERE d.prefix = ?1 AND d.reset_yearly = ?3
                 ON CONFLICT(prefix, year) DO UPDATE SET
                     current_number = current_number + 1,
                     updated_at = excluded.updated_at
                 RETURNING current_number, format_template",
                || {
                    libsql::params![
                        prefix,
                        scope.storage_year(),
                        i64::from(reset_yearly),
                        now.as_str()
                    ]
                },
            )
            .await
            .map_err(|e| fail(e.to_string()))?
            .ok_or_else(|| fail("sequence definition changed during the request".to_string()))?;

        let sequence = row.get::<i64>(0).map_err(|e| fail(e.to_string()))?;
        let stored = row.get::<String>(1).map_err(|e| fail(e.to_string()))?;
        let template = if stored == template.as_str() {
            template
        } else {
            SequenceTemplate::parse(&stored).map_err(|e| fail(e.to_string()))?
        };

        let code = template.render(prefix, year, sequence);
        tracing::debug!(prefix, year, sequence, %code, "sequence number issued");
        Ok(IssuedNumber {
            code,
            sequence,
            prefix: prefix.to_string(),
            year,
        })
    }

    /// Issue the next number using the prefix's own yearly-reset setting,
    /// which defaults to resetting when no definition exists.
    ///
    /// # Errors
    ///
    /// See [`ErpService::next_number`].
    pub async fn next_number_for(
        &self,
        prefix: &str,
        year: Option<i32>,
    ) -> Result<IssuedNumber, DatabaseError> {
        let reset_yearly = self
            .get_sequence_definition(prefix)
            .await?
            .is_none_or(|def| def.reset_yearly);
        self.next_number(prefix, year, reset_yearly).await
    }

    /// Store the default definition for a prefix seen for the first time.
    /// A concurrent first call may win; its definition is returned then.
    async fn pin_sequence(
        &self,
        prefix: &str,
        reset_yearly: bool,
    ) -> Result<SequenceDefinition, DatabaseError> {
        let def = SequenceDefinition::new(
            prefix,
            self.default_template().as_str(),
            String::new(),
            reset_yearly,
        );
        Self::validate_definition(&def)?;
        if self.insert_definition(&def).await?.is_some() {
            tracing::info!(prefix, scope = scope_name(reset_yearly), "sequence pinned on first use");
        }
        self.get_sequence_definition(prefix)
            .await?
            .ok_or(DatabaseError::NoResult)
    }

    async fn insert_definition(
        &self,
        def: &SequenceDefinition,
    ) -> Result<Option<SequenceDefinition>, DatabaseError> {
        let row = self
            .db()
            .query_row_with(
                &format!(
                    "INSERT INTO sequence_definitions
                         (prefix, format_template, description, reset_yearly, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(prefix) DO NOTHING
                     RETURNING {DEFINITION_COLUMNS}"
                ),
                || {
                    libsql::params![
                        def.prefix.as_str(),
                        def.format_template.as_str(),
                        def.description.as_str(),
                        i64::from(def.reset_yearly),
                        format_timestamp(&Utc::now())
                    ]
                },
            )
            .await?;
        row.as_ref().map(row_to_definition).transpose()
    }

    /// Create or replace the definition for a prefix and record the change.
    ///
    /// Once the prefix has counters, the template and yearly reset are fixed
    /// and only the description can change.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if the prefix or template is invalid or
    /// the change would alter a prefix that already issued numbers, and
    /// `DatabaseError::AuditWrite` if the audit entry cannot be written under
    /// the strict policy.
    pub async fn define_sequence(
        &self,
        def: &SequenceDefinition,
    ) -> Result<SequenceDefinition, DatabaseError> {
        Self::validate_definition(def)?;
        let reset_yearly = i64::from(def.reset_yearly);

        let txn = self.db().begin_write().await?;
        let before = txn
            .query_row(
                &format!("SELECT {DEFINITION_COLUMNS} FROM sequence_definitions WHERE prefix = ?1"),
                [def.prefix.as_str()],
            )
            .await?
            .as_ref()
            .map(row_to_definition)
            .transpose()?;
        // A perpetual counter has year 0; a yearly one any other year.
        let conflicting = txn
            .query_row(
                "SELECT COUNT(*) FROM number_sequences
                 WHERE prefix = ?1 AND (format_template <> ?2 OR (year = 0) = ?3)",
                libsql::params![def.prefix.as_str(), def.format_template.as_str(), reset_yearly],
            )
            .await?
            .ok_or(DatabaseError::NoResult)?
            .get::<i64>(0)?;
        if conflicting > 0 {
            return Err(CoreError::Validation(format!(
                "sequence '{}' has issued numbers; only its description can change",
                def.prefix
            ))
            .into());
        }
        let row = txn
            .query_row(
                &format!(
                    "INSERT INTO sequence_definitions
                         (prefix, format_template, description, reset_yearly, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(prefix) DO UPDATE SET
                         format_template = excluded.format_template,
                         description = excluded.description,
                         reset_yearly = excluded.reset_yearly,
                         updated_at = excluded.updated_at
                     RETURNING {DEFINITION_COLUMNS}"
                ),
                libsql::params![
                    def.prefix.as_str(),
                    def.format_template.as_str(),
                    def.description.as_str(),
                    reset_yearly,
                    format_timestamp(&Utc::now())
                ],
            )
            .await?
            .ok_or(DatabaseError::NoResult)?;
        let stored = row_to_definition(&row)?;
        txn.commit().await?;

        let change = match before {
            Some(before) => Change::Updated {
                before: Some(before.snapshot()),
            },
            None => Change::Created,
        };
        self.record_change(&stored, change).await?;
        tracing::info!(prefix = %stored.prefix, template = %stored.format_template, "sequence defined");
        Ok(stored)
    }

    /// Store a definition only if the prefix has none yet, recording the
    /// creation.
    ///
    /// Returns `true` when the definition was inserted.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Core` if the prefix or template is invalid,
    /// and `DatabaseError` if the write or the audit entry fails.
    pub async fn ensure_sequence_definition(
        &self,
        def: &SequenceDefinition,
    ) -> Result<bool, DatabaseError> {
        Self::validate_definition(def)?;
        match self.insert_definition(def).await? {
            Some(stored) => {
                self.record_change(&stored, Change::Created).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn validate_definition(def: &SequenceDefinition) -> Result<(), CoreError> {
        validate_prefix(&def.prefix)?;
        let template = SequenceTemplate::parse(&def.format_template)?;
        // Any real year works here; only the scope kind matters.
        check_scope(&template, SequenceScope::new(1, def.reset_yearly))
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn get_sequence_definition(
        &self,
        prefix: &str,
    ) -> Result<Option<SequenceDefinition>, DatabaseError> {
        let row = self
            .db()
            .query_row_with(
                &format!("SELECT {DEFINITION_COLUMNS} FROM sequence_definitions WHERE prefix = ?1"),
                || [prefix],
            )
            .await?;
        row.as_ref().map(row_to_definition).transpose()
    }

    /// All definitions, ordered by prefix.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_sequence_definitions(
        &self,
    ) -> Result<Vec<SequenceDefinition>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {DEFINITION_COLUMNS} FROM sequence_definitions ORDER BY prefix"),
                || (),
            )
            .await?;
        let mut defs = Vec::new();
        while let Some(row) = rows.next().await? {
            defs.push(row_to_definition(&row)?);
        }
        Ok(defs)
    }

    /// Counters, optionally for one prefix, ordered by prefix then year.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_counters(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<SequenceCounter>, DatabaseError> {
        let mut rows = match prefix {
            Some(prefix) => {
                self.db()
                    .query_with(
                        &format!(
                            "SELECT {COUNTER_COLUMNS} FROM number_sequences
                             WHERE prefix = ?1 ORDER BY year"
                        ),
                        || [prefix],
                    )
                    .await?
            }
            None => {
                self.db()
                    .query_with(
                        &format!(
                            "SELECT {COUNTER_COLUMNS} FROM number_sequences
                             ORDER BY prefix, year"
                        ),
                        || (),
                    )
                    .await?
            }
        };
        let mut counters = Vec::new();
        while let Some(row) = rows.next().await? {
            counters.push(row_to_counter(&row)?);
        }
        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::audit::AuditFilter;
    use crate::test_support::test_service;
    use erp_core::actor::{self, ActorContext, ActorId};
    use erp_core::enums::AuditAction;
    use erp_core::sequence::PERPETUAL_YEAR;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn definition(prefix: &str, template: &str, reset_yearly: bool) -> SequenceDefinition {
        SequenceDefinition::new(prefix, template, format!("{prefix} numbers"), reset_yearly)
    }

    #[rstest]
    #[case("RCPT")]
    #[case("A")]
    #[case("FEE_2X")]
    #[case("ABCDEFGHIJ")]
    fn accepts_prefix(#[case] prefix: &str) {
        assert!(validate_prefix(prefix).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("ABCDEFGHIJK")]
    #[case("RC PT")]
    #[case("RCPT/")]
    #[case("FEE-2")]
    #[case("ÄPP")]
    fn rejects_prefix(#[case] prefix: &str) {
        assert!(validate_prefix(prefix).is_err());
    }

    #[tokio::test]
    async fn first_number_uses_default_template() {
        let svc = test_service().await;
        let issued = svc.next_number("RCPT", Some(2025), true).await.unwrap();
        assert_eq!(issued.code, "RCPT/2025/00001");
        assert_eq!(issued.sequence, 1);
        assert_eq!(issued.year, 2025);
    }

    #[tokio::test]
    async fn definition_template_applies_to_new_counter() {
        let svc = test_service().await;
        svc.define_sequence(&definition("APP", "{prefix}-{year}-{seq:04d}", true))
            .await
            .unwrap();
        let issued = svc.next_number("APP", Some(2024), true).await.unwrap();
        assert_eq!(issued.code, "APP-2024-0001");

        let counters = svc.list_counters(Some("APP")).await.unwrap();
        assert_eq!(counters[0].description, "APP numbers");
    }

    #[tokio::test]
    async fn issued_prefix_keeps_template_and_scope() {
        let svc = test_service().await;
        svc.next_number("INV", Some(2025), true).await.unwrap();

        for changed in [
            definition("INV", "{prefix}/{year}/{seq:03d}", true),
            definition("INV", "{prefix}/{year:04d}/{seq:05d}", false),
        ] {
            let err = svc.define_sequence(&changed).await.unwrap_err();
            assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));
        }

        let next_year = svc.next_number("INV", Some(2026), true).await.unwrap();
        assert_eq!(next_year.code, "INV/2026/00001");
    }

    #[tokio::test]
    async fn description_can_change_after_issue() {
        let svc = test_service().await;
        svc.next_number("RCPT", Some(2025), true).await.unwrap();
        let stored = svc
            .define_sequence(&definition("RCPT", "{prefix}/{year:04d}/{seq:05d}", true))
            .await
            .unwrap();
        assert_eq!(stored.description, "RCPT numbers");
        assert_eq!(svc.next_number("RCPT", Some(2025), true).await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn prefix_cannot_mix_yearly_and_perpetual() {
        let svc = test_service().await;
        let yearly = svc.next_number("RCPT", Some(2025), true).await.unwrap();
        assert_eq!(yearly.code, "RCPT/2025/00001");
        let err = svc.next_number("RCPT", Some(2025), false).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));

        svc.next_number("ADM", Some(2025), false).await.unwrap();
        assert!(svc.next_number("ADM", Some(2025), true).await.is_err());

        let keys: Vec<(String, i32)> = svc
            .list_counters(None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.prefix, c.year))
            .collect();
        assert_eq!(
            keys,
            vec![("ADM".to_string(), PERPETUAL_YEAR), ("RCPT".to_string(), 2025)]
        );
    }

    #[tokio::test]
    async fn first_use_pins_default_definition_without_audit() {
        let svc = test_service().await;
        svc.next_number("NEW", Some(2025), false).await.unwrap();

        let pinned = svc.get_sequence_definition("NEW").await.unwrap().unwrap();
        assert_eq!(pinned.format_template, svc.default_template().as_str());
        assert!(!pinned.reset_yearly);
        assert!(svc.query_audit(&AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn define_is_audited_as_create_then_update() {
        let svc = test_service().await;
        let stored = actor::scope(ActorContext::for_actor("user:3"), async {
            svc.define_sequence(&definition("APP", "{prefix}-{year}-{seq:04d}", true))
                .await
                .unwrap();
            svc.define_sequence(&SequenceDefinition::new(
                "APP",
                "{prefix}-{year}-{seq:05d}",
                "Applications",
                true,
            ))
            .await
            .unwrap()
        })
        .await;
        assert!(stored.id > 0);

        let history = svc.audit_history(&stored.entity_ref()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, AuditAction::Update);
        assert_eq!(history[0].actor, Some(ActorId::new("user:3")));
        let before = history[0].before_state.as_ref().unwrap();
        let after = history[0].after_state.as_ref().unwrap();
        assert_eq!(
            before.changed_fields(after),
            vec!["description".to_string(), "format_template".to_string()]
        );
        assert_eq!(history[1].action, AuditAction::Create);
    }

    #[tokio::test]
    async fn rejected_definition_is_not_audited() {
        let svc = test_service().await;
        svc.next_number("INV", Some(2025), true).await.unwrap();
        svc.define_sequence(&definition("INV", "{prefix}-{year}-{seq}", true))
            .await
            .unwrap_err();
        assert!(svc.query_audit(&AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn perpetual_counter_spans_years() {
        let svc = test_service().await;
        assert_eq!(svc.next_number("ADM", Some(2024), false).await.unwrap().sequence, 1);
        let later = svc.next_number("ADM", Some(2025), false).await.unwrap();
        assert_eq!(later.sequence, 2);
        assert_eq!(later.code, "ADM/2025/00002");

        let counters = svc.list_counters(Some("ADM")).await.unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].year, PERPETUAL_YEAR);
    }

    #[tokio::test]
    async fn yearly_template_without_year_is_rejected() {
        let svc = test_service().await;
        let err = svc
            .define_sequence(&definition("DOC", "{prefix}-{seq}", true))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));

        svc.define_sequence(&definition("DOC", "{prefix}-{seq}", false))
            .await
            .unwrap();
        let err = svc.next_number("DOC", Some(2025), true).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));
        assert!(svc.list_counters(Some("DOC")).await.unwrap().is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(10_000)]
    #[case(-5)]
    #[tokio::test]
    async fn out_of_range_year_is_rejected(#[case] year: i32) {
        let svc = test_service().await;
        let err = svc.next_number("RCPT", Some(year), true).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn next_number_for_follows_definition() {
        let svc = test_service().await;
        svc.define_sequence(&definition("ADM", "{prefix}/{year}/{seq:04d}", false))
            .await
            .unwrap();
        svc.next_number_for("ADM", Some(2024)).await.unwrap();
        let issued = svc.next_number_for("ADM", Some(2025)).await.unwrap();
        assert_eq!(issued.code, "ADM/2025/0002");

        let fresh = svc.next_number_for("NEW", Some(2025)).await.unwrap();
        assert_eq!(fresh.code, "NEW/2025/00001");
    }

    #[tokio::test]
    async fn ensure_definition_does_not_overwrite() {
        let svc = test_service().await;
        assert!(
            svc.ensure_sequence_definition(&definition("RCPT", "{prefix}/{year}/{seq:05d}", true))
                .await
                .unwrap()
        );
        assert_eq!(svc.query_audit(&AuditFilter::default()).await.unwrap().len(), 1);
        assert!(
            !svc.ensure_sequence_definition(&definition("RCPT", "{prefix}-{year}-{seq}", true))
                .await
                .unwrap()
        );
        let stored = svc.get_sequence_definition("RCPT").await.unwrap().unwrap();
        assert_eq!(stored.format_template, "{prefix}/{year}/{seq:05d}");
        assert_eq!(svc.list_sequence_definitions().await.unwrap().len(), 1);
        assert_eq!(svc.query_audit(&AuditFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_counters_orders_by_prefix_and_year() {
        let svc = test_service().await;
        svc.next_number("RCPT", Some(2025), true).await.unwrap();
        svc.next_number("APP", Some(2025), true).await.unwrap();
        svc.next_number("RCPT", Some(2024), true).await.unwrap();

        let keys: Vec<(String, i32)> = svc
            .list_counters(None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.prefix, c.year))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("APP".to_string(), 2025),
                ("RCPT".to_string(), 2024),
                ("RCPT".to_string(), 2025),
            ]
        );
    }
}
