use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::SettingsCommands;
use crate::commands::shared::limit::truncate_to;
use crate::context::AppContext;
use crate::output::output;

/// Handle `erp settings`.
pub async fn handle(
    action: &SettingsCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        SettingsCommands::Get { key } => {
            let setting = ctx
                .service
                .get_setting(key)
                .await?
                .with_context(|| format!("setting '{key}' not found"))?;
            output(&setting, flags.format)
        }
        SettingsCommands::Set {
            key,
            value,
            description,
        } => {
            let setting = ctx.service.set_setting(key, value, description).await?;
            output(&setting, flags.format)
        }
        SettingsCommands::List => {
            let settings = ctx.service.list_settings().await?;
            output(&truncate_to(settings, flags.limit), flags.format)
        }
    }
}
