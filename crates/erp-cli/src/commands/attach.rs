use anyhow::Context;

use erp_core::reference::EntityRef;
use erp_db::repos::attachments::NewAttachment;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AttachCommands;
use crate::commands::shared::limit::truncate_to;
use crate::commands::shared::parse::parse_entity_kind;
use crate::context::AppContext;
use crate::output::output;

/// Handle `erp attach`.
pub async fn handle(action: &AttachCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        AttachCommands::Add { .. } => {
            let attachment = ctx.service.add_attachment(&new_attachment(action)?).await?;
            output(&attachment, flags.format)
        }
        AttachCommands::List {
            entity_kind,
            entity_id,
        } => {
            let target = EntityRef::new(parse_entity_kind(entity_kind)?, *entity_id);
            let attachments = ctx.service.list_attachments(&target).await?;
            output(&truncate_to(attachments, flags.limit), flags.format)
        }
        AttachCommands::Remove { id } => {
            let removed = ctx
                .service
                .remove_attachment(*id)
                .await?
                .with_context(|| format!("attachment {id} not found"))?;
            output(&removed, flags.format)
        }
    }
}

fn new_attachment(action: &AttachCommands) -> anyhow::Result<NewAttachment> {
    let AttachCommands::Add {
        entity_kind,
        entity_id,
        file_path,
        name,
        label,
        size,
        mime_type,
    } = action
    else {
        anyhow::bail!("not an add command");
    };
    let target = EntityRef::new(parse_entity_kind(entity_kind)?, *entity_id);
    let mut new = NewAttachment::new(target, file_path.as_str())
        .with_name(name.as_str())
        .with_label(label.as_str())
        .with_mime_type(mime_type.as_str());
    if let Some(bytes) = size {
        new = new.with_size(*bytes);
    }
    Ok(new)
}
