//! Reference number generation settings.

use erp_core::sequence::{DEFAULT_TEMPLATE, SequenceTemplate};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// Attempts per `next` call when the database reports it is locked.
const fn default_max_attempts() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SequenceConfig {
    /// Template for prefixes without their own definition.
    #[serde(default = "default_template")]
    pub default_template: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl SequenceConfig {
    /// Parse `default_template`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the template does not parse.
    pub fn template(&self) -> Result<SequenceTemplate, ConfigError> {
        SequenceTemplate::parse(&self.default_template).map_err(|e| ConfigError::InvalidValue {
            field: "sequence.default_template".into(),
            reason: e.to_string(),
        })
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            default_template: default_template(),
            max_attempts: default_max_attempts(),
        }
    }
}
