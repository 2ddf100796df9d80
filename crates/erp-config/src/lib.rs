//! # erp-config
//!
//! Layered configuration loading for the college ERP using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`ERP_*` prefix, `__` as separator)
//! 2. Project-level `.erp/config.toml`
//! 3. User-level `~/.config/college-erp/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! `ERP_DATABASE__PATH` -> `database.path`,
//! `ERP_AUDIT__FAILURE_POLICY` -> `audit.failure_policy`, and so on.
//!
//! # Usage
//!
//! ```no_run
//! use erp_config::ErpConfig;
//!
//! let config = ErpConfig::load_with_dotenv().expect("config");
//! println!("database: {}", config.database.path);
//! ```

mod audit;
mod database;
mod error;
mod general;
mod sequence;

pub use audit::AuditConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use general::GeneralConfig;
pub use sequence::SequenceConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ErpConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl ErpConfig {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Does NOT read `.env`; use [`ErpConfig::load_with_dotenv`] for that.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source fails to parse or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source fails to parse or a value is invalid.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Extract and validate a config from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests and the CLI can merge extra providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".erp/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("ERP_").split("__"))
    }

    /// Reject values that deserialize but cannot work.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.path".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.sequence.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sequence.max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        self.sequence.template()?;
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("college-erp").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ErpConfig::default();
        config.validate().unwrap();
        assert_eq!(config.audit.default_limit, 100);
        assert_eq!(config.general.actor(), None);
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = ErpConfig::default();
        config.sequence.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "sequence.max_attempts"
        ));
    }

    #[test]
    fn empty_database_path_rejected() {
        let mut config = ErpConfig::default();
        config.database.path = String::new();
        assert!(config.validate().is_err());
    }
}
