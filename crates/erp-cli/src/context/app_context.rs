use std::path::Path;

use anyhow::Context;
use erp_config::ErpConfig;
use erp_db::service::ErpService;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub service: ErpService,
    pub config: ErpConfig,
}

impl AppContext {
    /// Open (and migrate) the configured database.
    pub async fn init(config: ErpConfig) -> anyhow::Result<Self> {
        if !config.database.is_in_memory() {
            ensure_parent_dir(Path::new(&config.database.path))?;
        }

        let service = ErpService::new_local(&config)
            .await
            .with_context(|| format!("failed to open database '{}'", config.database.path))?;
        tracing::debug!(path = %config.database.path, policy = ?service.failure_policy(), "service ready");

        Ok(Self { service, config })
    }
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display())),
        _ => Ok(()),
    }
}
