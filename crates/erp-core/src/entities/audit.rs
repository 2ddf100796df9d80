use std::net::IpAddr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::enums::AuditAction;
use crate::reference::EntityRef;
use crate::snapshot::Snapshot;

/// One immutable row of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    /// `None` for anonymous or system-initiated changes.
    pub actor: Option<ActorId>,
    pub action: AuditAction,
    pub target: EntityRef,
    /// Absent for creates.
    pub before_state: Option<Snapshot>,
    pub after_state: Option<Snapshot>,
    pub client_address: Option<IpAddr>,
    pub client_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
