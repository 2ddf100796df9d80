use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::reference::{EntityKind, EntityRef};
use crate::snapshot::{Auditable, Snapshot};

/// System-wide key/value setting, e.g. `ACADEMIC_YEAR = 2024-25`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Setting {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auditable for Setting {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::SETTING, self.id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::builder()
            .field("id", &self.id)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("description", &self.description)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .build()
    }
}
