use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::reference::{EntityKind, EntityRef};
use crate::snapshot::{Auditable, Snapshot};

/// Per-`(prefix, year)` counter row. `year = 0` marks a perpetual counter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SequenceCounter {
    pub prefix: String,
    pub year: i32,
    pub current_number: i64,
    pub format_template: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Template and yearly-reset rule of a prefix.
///
/// Every prefix that has issued a number has one, pinned on first use if the
/// operator never defined it. Once counters exist only the description may
/// change.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SequenceDefinition {
    /// Assigned by storage; ignored on write.
    #[serde(default)]
    pub id: i64,
    pub prefix: String,
    pub format_template: String,
    pub description: String,
    pub reset_yearly: bool,
}

impl SequenceDefinition {
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        format_template: impl Into<String>,
        description: impl Into<String>,
        reset_yearly: bool,
    ) -> Self {
        Self {
            id: 0,
            prefix: prefix.into(),
            format_template: format_template.into(),
            description: description.into(),
            reset_yearly,
        }
    }
}

impl Auditable for SequenceDefinition {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(EntityKind::NUMBER_SEQUENCE, self.id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::builder()
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("format_template", &self.format_template)
            .field("description", &self.description)
            .field("reset_yearly", &self.reset_yearly)
            .build()
    }
}

/// A freshly issued reference code.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct IssuedNumber {
    pub code: String,
    pub sequence: i64,
    pub prefix: String,
    pub year: i32,
}
