use schemars::schema_for;

use erp_core::entities::{Attachment, AuditEntry, SequenceCounter, SequenceDefinition, Setting};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{SchemaArgs, SchemaType};
use crate::output::output;

/// Handle `erp schema`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&schema_json(args.type_name), flags.format)
}

fn schema_json(kind: SchemaType) -> serde_json::Value {
    let schema = match kind {
        SchemaType::Attachment => schema_for!(Attachment),
        SchemaType::AuditEntry => schema_for!(AuditEntry),
        SchemaType::SequenceCounter => schema_for!(SequenceCounter),
        SchemaType::SequenceDefinition => schema_for!(SequenceDefinition),
        SchemaType::Setting => schema_for!(Setting),
    };
    schema.to_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_entry_schema_names_target_and_states() {
        let schema = schema_json(SchemaType::AuditEntry);
        let properties = schema["properties"].as_object().expect("object schema");
        for field in ["actor", "action", "target", "before_state", "after_state", "recorded_at"] {
            assert!(properties.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn every_schema_type_renders() {
        for kind in [
            SchemaType::Attachment,
            SchemaType::AuditEntry,
            SchemaType::SequenceCounter,
            SchemaType::SequenceDefinition,
            SchemaType::Setting,
        ] {
            assert!(schema_json(kind).is_object());
        }
    }
}
