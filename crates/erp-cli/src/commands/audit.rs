use erp_core::entities::AuditEntry;
use erp_core::enums::AuditAction;
use erp_db::repos::audit::AuditFilter;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::AuditArgs;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::{parse_entity_kind, parse_enum, parse_instant};
use crate::context::AppContext;
use crate::output::output;

/// Handle `erp audit`.
pub async fn handle(args: &AuditArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let entries = fetch(args, ctx, flags).await?;
    output(&entries, flags.format)
}

pub async fn fetch(
    args: &AuditArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Vec<AuditEntry>> {
    let filter = build_filter(args, flags, ctx.service.default_audit_limit())?;
    ctx.service.query_audit(&filter).await.map_err(Into::into)
}

fn build_filter(
    args: &AuditArgs,
    flags: &GlobalFlags,
    default_limit: u32,
) -> anyhow::Result<AuditFilter> {
    Ok(AuditFilter {
        actor: args.actor.clone(),
        action: args
            .action
            .as_deref()
            .map(|value| parse_enum::<AuditAction>(value, "action"))
            .transpose()?,
        entity_kind: args
            .entity_kind
            .as_deref()
            .map(parse_entity_kind)
            .transpose()?,
        entity_id: args.entity_id,
        since: args
            .since
            .as_deref()
            .map(|value| parse_instant(value, "since"))
            .transpose()?,
        until: args
            .until
            .as_deref()
            .map(|value| parse_instant(value, "until"))
            .transpose()?,
        limit: Some(effective_limit(None, flags.limit, default_limit)),
    })
}
