use chrono::{DateTime, NaiveDate, Utc};
use erp_core::reference::EntityKind;
use serde::de::DeserializeOwned;

/// Parse a snake_case enum value using serde-deserialization.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.replace('-', "_");
    let json = format!("\"{normalized}\"");
    serde_json::from_str(&json).map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

/// Parse an entity kind such as `fee_payment`.
pub fn parse_entity_kind(raw: &str) -> anyhow::Result<EntityKind> {
    raw.parse::<EntityKind>()
        .map_err(|error| anyhow::anyhow!("invalid entity-kind '{raw}': {error}"))
}

/// Parse an RFC 3339 timestamp, or a bare date meaning its UTC midnight.
pub fn parse_instant(raw: &str, field: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid {field} '{raw}': expected RFC 3339 or YYYY-MM-DD"))
}
