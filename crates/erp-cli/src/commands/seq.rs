use erp_core::entities::SequenceDefinition;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::SeqCommands;
use crate::commands::shared::limit::truncate_to;
use crate::context::AppContext;
use crate::output::output;

/// Handle `erp seq`.
pub async fn handle(action: &SeqCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        SeqCommands::Next {
            prefix,
            year,
            no_reset_yearly,
        } => {
            let issued = if *no_reset_yearly {
                ctx.service.next_number(prefix, *year, false).await?
            } else {
                ctx.service.next_number_for(prefix, *year).await?
            };
            output(&issued, flags.format)
        }
        SeqCommands::Define {
            prefix,
            template,
            description,
            no_reset_yearly,
        } => {
            let def = ctx
                .service
                .define_sequence(&SequenceDefinition::new(
                    prefix.as_str(),
                    template.as_str(),
                    description.as_str(),
                    !no_reset_yearly,
                ))
                .await?;
            output(&def, flags.format)
        }
        SeqCommands::List { prefix } => {
            let counters = ctx.service.list_counters(prefix.as_deref()).await?;
            output(&truncate_to(counters, flags.limit), flags.format)
        }
    }
}
