//! General application configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Actor credited with CLI changes when `--actor` is not given.
    /// Empty means anonymous.
    #[serde(default)]
    pub actor: String,
}

impl GeneralConfig {
    #[must_use]
    pub fn actor(&self) -> Option<&str> {
        let actor = self.actor.trim();
        (!actor.is_empty()).then_some(actor)
    }
}
