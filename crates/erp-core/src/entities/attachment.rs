use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::reference::{EntityKind, EntityRef};
use crate::snapshot::{Auditable, Snapshot};

/// Metadata of a file attached to any record. The file itself lives outside
/// the database; `file_path` is its storage key.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    /// The record the file belongs to.
    pub target: EntityRef,
    pub file_path: String,
    pub name: String,
    pub label: String,
    pub file_size: Option<i64>,
    pub mime_type: String,
    /// Actor of the unit of work that stored the attachment.
    pub uploaded_by: Option<ActorId>,
    pub uploaded_at: DateTime<Utc>,
}

impl Auditable for Attachment {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::ATTACHMENT, self.id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::builder()
            .field("id", &self.id)
            .field("target_kind", &self.target.kind)
            .reference("target", Some(&self.target))
            .field("file_path", &self.file_path)
            .field("name", &self.name)
            .field("label", &self.label)
            .field("file_size", &self.file_size)
            .field("mime_type", &self.mime_type)
            .field("uploaded_by", &self.uploaded_by)
            .field("uploaded_at", &self.uploaded_at)
            .build()
    }
}
