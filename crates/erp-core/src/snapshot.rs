//! Field snapshots for audit before/after state.
//!
//! A snapshot is a flat map of field name to JSON scalar. Each field is
//! serialized on its own so one bad field cannot sink the whole record:
//! the builder drops it and remembers its name. Values that serialize to an
//! object or array are dropped the same way.
//!
//! Dates and timestamps go through their chrono `Serialize` impls, which emit
//! ISO-8601 strings. Relations are written as the bare id of the referenced
//! record, never the nested record.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::reference::EntityRef;

/// Serialized field values of one record at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, serde_json::Value>);

impl Snapshot {
    #[must_use]
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of fields whose value differs between `self` (before) and `after`,
    /// including fields present on only one side.
    #[must_use]
    pub fn changed_fields(&self, after: &Self) -> Vec<String> {
        let mut changed: Vec<String> = self
            .0
            .iter()
            .filter(|(k, v)| after.0.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(
            after
                .0
                .keys()
                .filter(|k| !self.0.contains_key(*k))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

/// Incremental snapshot construction, tolerant of per-field failures.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    fields: BTreeMap<String, serde_json::Value>,
    skipped: Vec<String>,
}

impl SnapshotBuilder {
    /// Add a field. A value that fails to serialize, or is not a scalar, is
    /// skipped.
    #[must_use]
    pub fn field<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                tracing::debug!(field = name, "skipping non-scalar snapshot field");
                self.skipped.push(name.to_string());
            }
            Ok(json) => {
                self.fields.insert(name.to_string(), json);
            }
            Err(error) => {
                tracing::debug!(field = name, %error, "skipping unserializable snapshot field");
                self.skipped.push(name.to_string());
            }
        }
        self
    }

    /// Add a relation as the bare id of the referenced record.
    #[must_use]
    pub fn reference(mut self, name: &str, target: Option<&EntityRef>) -> Self {
        let value = target.map_or(serde_json::Value::Null, |t| serde_json::Value::from(t.id));
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Names of the fields dropped so far.
    #[must_use]
    pub fn skipped_fields(&self) -> &[String] {
        &self.skipped
    }

    #[must_use]
    pub fn build(self) -> Snapshot {
        Snapshot(self.fields)
    }
}

/// A record whose changes can be written to the audit log.
pub trait Auditable {
    /// The `(kind, id)` of this record.
    fn entity_ref(&self) -> EntityRef;

    /// Current field values.
    fn snapshot(&self) -> Snapshot;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::EntityKind;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no wire form"))
        }
    }

    #[test]
    fn dates_render_as_iso_8601() {
        let admitted = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let updated = Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap();
        let snap = Snapshot::builder()
            .field("admission_date", &admitted)
            .field("updated_at", &updated)
            .build();

        assert_eq!(snap.get("admission_date"), Some(&serde_json::json!("2025-07-01")));
        assert_eq!(
            snap.get("updated_at"),
            Some(&serde_json::json!("2025-07-01T09:30:00Z"))
        );
    }

    #[test]
    fn references_render_as_bare_id() {
        let dept = EntityRef::new(EntityKind::DEPARTMENT, 7);
        let snap = Snapshot::builder()
            .reference("department", Some(&dept))
            .reference("mentor", None)
            .build();

        assert_eq!(snap.get("department"), Some(&serde_json::json!(7)));
        assert_eq!(snap.get("mentor"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn unserializable_field_is_skipped() {
        let builder = Snapshot::builder()
            .field("name", "Asha")
            .field("photo", &Unserializable)
            .field("semester", &3);
        assert_eq!(builder.skipped_fields(), ["photo".to_string()]);

        let snap = builder.build();
        assert_eq!(snap.len(), 2);
        assert!(snap.contains("name"));
        assert!(snap.contains("semester"));
        assert!(!snap.contains("photo"));
    }

    #[test]
    fn nested_values_are_skipped() {
        let dept = EntityRef::new(EntityKind::DEPARTMENT, 7);
        let builder = Snapshot::builder()
            .field("department", &dept)
            .field("subjects", &["maths", "physics"])
            .field("semester", &3);
        assert_eq!(
            builder.skipped_fields(),
            ["department".to_string(), "subjects".to_string()]
        );
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn changed_fields_covers_edits_additions_and_removals() {
        let before = Snapshot::builder()
            .field("value", "1")
            .field("description", "Semester")
            .field("legacy", &true)
            .build();
        let after = Snapshot::builder()
            .field("value", "2")
            .field("description", "Semester")
            .field("note", "new")
            .build();

        assert_eq!(
            before.changed_fields(&after),
            vec!["legacy".to_string(), "note".to_string(), "value".to_string()]
        );
    }

    #[test]
    fn snapshot_serializes_as_flat_object() {
        let snap = Snapshot::builder().field("key", "ACADEMIC_YEAR").build();
        assert_eq!(
            serde_json::to_value(&snap).unwrap(),
            serde_json::json!({"key": "ACADEMIC_YEAR"})
        );
    }
}
