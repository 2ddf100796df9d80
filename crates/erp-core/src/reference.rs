//! Tagged references to any domain record.
//!
//! The audit log points at records of every kind without a foreign key to
//! each table. A reference is a `(kind, id)` pair; resolving it to a concrete
//! row is the reader's job.

use std::borrow::Cow;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

const MAX_KIND_LEN: usize = 64;

/// Discriminator naming a domain type, e.g. `student` or `fee_payment`.
///
/// Always lowercase `snake_case`, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    pub const STUDENT: Self = Self(Cow::Borrowed("student"));
    pub const FACULTY: Self = Self(Cow::Borrowed("faculty"));
    pub const STAFF: Self = Self(Cow::Borrowed("staff"));
    pub const DEPARTMENT: Self = Self(Cow::Borrowed("department"));
    pub const PROGRAM: Self = Self(Cow::Borrowed("program"));
    pub const FEE_STRUCTURE: Self = Self(Cow::Borrowed("fee_structure"));
    pub const FEE_PAYMENT: Self = Self(Cow::Borrowed("fee_payment"));
    pub const HOSTEL_ALLOCATION: Self = Self(Cow::Borrowed("hostel_allocation"));
    pub const EXAM: Self = Self(Cow::Borrowed("exam"));
    pub const GRADE: Self = Self(Cow::Borrowed("grade"));
    pub const DOCUMENT: Self = Self(Cow::Borrowed("document"));
    pub const SETTING: Self = Self(Cow::Borrowed("setting"));
    pub const NUMBER_SEQUENCE: Self = Self(Cow::Borrowed("number_sequence"));
    pub const ATTACHMENT: Self = Self(Cow::Borrowed("attachment"));

    /// Validate and wrap a kind name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the name is empty, longer than 64
    /// characters, or not lowercase `snake_case`.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        validate_kind(&name)?;
        Ok(Self(Cow::Owned(name)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_kind(name: &str) -> Result<(), CoreError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(CoreError::Validation("entity kind must not be empty".into()));
    };
    if name.len() > MAX_KIND_LEN {
        return Err(CoreError::Validation(format!(
            "entity kind '{name}' exceeds {MAX_KIND_LEN} characters"
        )));
    }
    if !first.is_ascii_lowercase()
        || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "entity kind '{name}' must be lowercase snake_case"
        )));
    }
    Ok(())
}

impl TryFrom<String> for EntityKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.0.into_owned()
    }
}

impl std::str::FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl JsonSchema for EntityKind {
    fn schema_name() -> Cow<'static, str> {
        "EntityKind".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "pattern": "^[a-z][a-z0-9_]*$",
            "maxLength": MAX_KIND_LEN,
        })
    }
}

/// Reference to one record of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    #[must_use]
    pub const fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
