//! Audit log repository.
//!
//! Append-only entries recording every change to any entity. The actor is
//! taken from the task-scoped actor context at write time, never from the
//! caller. Reads support the operator's filters: actor, action, entity and
//! time range.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use erp_core::actor;
use erp_core::entities::AuditEntry;
use erp_core::enums::{AuditAction, AuditFailurePolicy};
use erp_core::reference::{EntityKind, EntityRef};
use erp_core::snapshot::{Auditable, Snapshot};

use crate::error::DatabaseError;
use crate::helpers::{
    format_timestamp, get_opt_string, parse_datetime, parse_enum, parse_optional_snapshot,
};
use crate::service::ErpService;

const AUDIT_COLUMNS: &str = "id, actor, action, entity_kind, entity_id, before_state, after_state,
     client_address, client_agent, recorded_at";

/// One change to write to the log. The actor is not part of it.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub target: EntityRef,
    pub before_state: Option<Snapshot>,
    pub after_state: Option<Snapshot>,
    pub client_address: Option<IpAddr>,
    pub client_agent: Option<String>,
}

impl AuditRecord {
    #[must_use]
    pub const fn new(action: AuditAction, target: EntityRef) -> Self {
        Self {
            action,
            target,
            before_state: None,
            after_state: None,
            client_address: None,
            client_agent: None,
        }
    }

    #[must_use]
    pub fn with_before(mut self, before: Snapshot) -> Self {
        self.before_state = Some(before);
        self
    }

    #[must_use]
    pub fn with_after(mut self, after: Snapshot) -> Self {
        self.after_state = Some(after);
        self
    }

    /// Take caller address and agent from the current actor context.
    #[must_use]
    pub fn with_current_client(mut self) -> Self {
        let ctx = actor::current();
        self.client_address = ctx.client_address;
        self.client_agent = ctx.client_agent;
        self
    }
}

/// What happened to an entity, as reported by the persistence hook.
#[derive(Debug, Clone)]
pub enum Change {
    Created,
    /// `before` must be captured before the mutation.
    Updated { before: Option<Snapshot> },
    /// `before` defaults to the entity's own snapshot.
    Deleted { before: Option<Snapshot> },
    Viewed,
}

/// Filter criteria for audit queries.
#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<AuditAction>,
    pub entity_kind: Option<EntityKind>,
    pub entity_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl AuditFilter {
    /// All entries about one record.
    #[must_use]
    pub fn for_target(target: &EntityRef) -> Self {
        Self {
            entity_kind: Some(target.kind.clone()),
            entity_id: Some(target.id),
            ..Self::default()
        }
    }
}

fn row_to_entry(row: &libsql::Row) -> Result<AuditEntry, DatabaseError> {
    let client_address = get_opt_string(row, 7)?
        .map(|raw| {
            raw.parse::<IpAddr>()
                .map_err(|e| DatabaseError::Query(format!("Invalid client address '{raw}': {e}")))
        })
        .transpose()?;
    Ok(AuditEntry {
        id: row.get::<i64>(0)?,
        actor: get_opt_string(row, 1)?.map(actor::ActorId::from),
        action: parse_enum(&row.get::<String>(2)?)?,
        target: EntityRef::new(EntityKind::new(row.get::<String>(3)?)?, row.get::<i64>(4)?),
        before_state: parse_optional_snapshot(get_opt_string(row, 5)?.as_deref())?,
        after_state: parse_optional_snapshot(get_opt_string(row, 6)?.as_deref())?,
        client_address,
        client_agent: get_opt_string(row, 8)?,
        recorded_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

fn snapshot_json(snapshot: Option<&Snapshot>) -> Result<Option<String>, DatabaseError> {
    snapshot
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::Other(e.into()))
}

impl ErpService {
    /// Append one entry, crediting the actor of the current unit of work.
    ///
    /// A `before_state` passed with a `Create` or `View` is dropped: neither
    /// changes the record.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::AuditWrite` if the entry cannot be persisted.
    pub async fn record(&self, record: AuditRecord) -> Result<AuditEntry, DatabaseError> {
        let entity = record.target.to_string();
        self.insert_entry(record).await.map_err(|e| {
            tracing::error!(%entity, error = %e, "audit write failed");
            DatabaseError::AuditWrite {
                target: entity,
                reason: e.to_string(),
            }
        })
    }

    async fn insert_entry(&self, mut record: AuditRecord) -> Result<AuditEntry, DatabaseError> {
        if !record.action.has_before_state() && record.before_state.take().is_some() {
            tracing::debug!(
                entity = %record.target,
                action = %record.action,
                "ignoring before state"
            );
        }

        let current_actor = actor::get_current_actor();
        let recorded_at = Utc::now();
        let before = snapshot_json(record.before_state.as_ref())?;
        let after = snapshot_json(record.after_state.as_ref())?;
        let address = record.client_address.map(|a| a.to_string());

        let row = self
            .db()
            .query_row_with(
                &format!(
                    "INSERT INTO audit_log (actor, action, entity_kind, entity_id, before_state,
                         after_state, client_address, client_agent, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     RETURNING {AUDIT_COLUMNS}"
                ),
                || {
                    libsql::params![
                        current_actor.as_ref().map(actor::ActorId::as_str),
                        record.action.as_str(),
                        record.target.kind.as_str(),
                        record.target.id,
                        before.as_deref(),
                        after.as_deref(),
                        address.as_deref(),
                        record.client_agent.as_deref(),
                        format_timestamp(&recorded_at)
                    ]
                },
            )
            .await?
            .ok_or(DatabaseError::NoResult)?;

        let entry = row_to_entry(&row)?;
        tracing::debug!(
            id = entry.id,
            action = %entry.action,
            entity = %entry.target,
            actor = entry.actor.as_ref().map_or("-", actor::ActorId::as_str),
            "audit entry recorded"
        );
        Ok(entry)
    }

    /// Persistence hook: record a change to `entity` under the configured
    /// failure policy.
    ///
    /// The after state is read from the entity now; the before state must
    /// have been captured by the caller ahead of the mutation. Caller address
    /// and agent come from the actor context.
    ///
    /// Returns `Ok(None)` only when the write failed under
    /// [`AuditFailurePolicy::BestEffort`].
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::AuditWrite` under [`AuditFailurePolicy::Strict`].
    pub async fn record_change<E>(
        &self,
        entity: &E,
        change: Change,
    ) -> Result<Option<AuditEntry>, DatabaseError>
    where
        E: Auditable + ?Sized,
    {
        let target = entity.entity_ref();
        let record = match change {
            Change::Created => {
                AuditRecord::new(AuditAction::Create, target).with_after(entity.snapshot())
            }
            Change::Updated { before } => {
                let record =
                    AuditRecord::new(AuditAction::Update, target).with_after(entity.snapshot());
                match before {
                    Some(before) => record.with_before(before),
                    None => record,
                }
            }
            Change::Deleted { before } => AuditRecord::new(AuditAction::Delete, target)
                .with_before(before.unwrap_or_else(|| entity.snapshot())),
            Change::Viewed => AuditRecord::new(AuditAction::View, target),
        }
        .with_current_client();

        match self.record(record).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => match self.failure_policy() {
                AuditFailurePolicy::Strict => Err(e),
                AuditFailurePolicy::BestEffort => {
                    tracing::error!(error = %e, "audit entry lost under best_effort policy");
                    Ok(None)
                }
            },
        }
    }

    /// Query audit entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, DatabaseError> {
        let mut conditions = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(ref actor) = filter.actor {
            params.push(libsql::Value::Text(actor.clone()));
            conditions.push(format!("actor = ?{}", params.len()));
        }
        if let Some(action) = filter.action {
            params.push(libsql::Value::Text(action.as_str().to_string()));
            conditions.push(format!("action = ?{}", params.len()));
        }
        if let Some(ref kind) = filter.entity_kind {
            params.push(libsql::Value::Text(kind.as_str().to_string()));
            conditions.push(format!("entity_kind = ?{}", params.len()));
        }
        if let Some(id) = filter.entity_id {
            params.push(libsql::Value::Integer(id));
            conditions.push(format!("entity_id = ?{}", params.len()));
        }
        if let Some(ref since) = filter.since {
            params.push(libsql::Value::Text(format_timestamp(since)));
            conditions.push(format!("recorded_at >= ?{}", params.len()));
        }
        if let Some(ref until) = filter.until {
            params.push(libsql::Value::Text(format_timestamp(until)));
            conditions.push(format!("recorded_at < ?{}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = filter.limit.unwrap_or_else(|| self.default_audit_limit());
        let sql = format!(
            "SELECT {AUDIT_COLUMNS}
             FROM audit_log {where_clause}
             ORDER BY recorded_at DESC, id DESC LIMIT {limit}"
        );

        let mut rows = self
            .db()
            .query_with(&sql, || libsql::params_from_iter(params.clone()))
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    /// Full history of one record, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn audit_history(&self, target: &EntityRef) -> Result<Vec<AuditEntry>, DatabaseError> {
        self.query_audit(&AuditFilter::for_target(target)).await
    }
}
