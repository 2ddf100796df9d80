use serde::Serialize;

use erp_core::entities::SequenceDefinition;
use erp_core::errors::CoreError;
use erp_db::error::DatabaseError;
use erp_db::service::ErpService;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::InitArgs;
use crate::context::AppContext;
use crate::output::output;

/// `(prefix, template, description, reset_yearly)`
const DEFAULT_SEQUENCES: &[(&str, &str, &str, bool)] = &[
    ("RCPT", "{prefix}/{year:04d}/{seq:05d}", "Fee payment receipts", true),
    ("APP", "{prefix}-{year}-{seq:04d}", "Admission applications", true),
    ("ADM", "{prefix}/{year:04d}{seq:04d}", "Admission numbers", true),
    ("INV", "{prefix}/{year}/{seq:06d}", "Invoices", true),
];

/// `(key, value, description)`
const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    ("ACADEMIC_YEAR", "2024-25", "Current Academic Year"),
    ("CURRENT_SEMESTER", "1", "Current Semester"),
    ("LATE_FEE_GRACE_DAYS", "7", "Grace days before late fee"),
    ("LATE_FEE_AMOUNT", "100", "Late fee amount per day"),
    ("EMAIL_NOTIFICATIONS", "True", "Enable email notifications"),
    ("SMS_NOTIFICATIONS", "False", "Enable SMS notifications"),
    ("AUTO_RECEIPT_GENERATION", "True", "Auto-generate receipts"),
    ("BACKUP_ENABLED", "True", "Enable automatic backups"),
    ("MAX_FILE_SIZE_MB", "10", "Maximum file upload size in MB"),
    ("PAYMENT_GATEWAY", "razorpay", "Default payment gateway"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedOutcome {
    Created,
    Kept,
    Overwritten,
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub name: String,
    pub outcome: SeedOutcome,
}

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub database: String,
    pub sequences: Vec<SeedResult>,
    pub settings: Vec<SeedResult>,
}

/// Handle `erp init`.
pub async fn handle(args: &InitArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let report = InitReport {
        database: ctx.config.database.path.clone(),
        sequences: seed_sequences(&ctx.service, args.force).await?,
        settings: seed_settings(&ctx.service, args.force).await?,
    };

    let changed = report
        .sequences
        .iter()
        .chain(&report.settings)
        .filter(|r| r.outcome != SeedOutcome::Kept)
        .count();
    tracing::info!(database = %report.database, changed, "college ERP initialized");

    if flags.quiet {
        return Ok(());
    }
    output(&report, flags.format)
}

pub async fn seed_sequences(service: &ErpService, force: bool) -> anyhow::Result<Vec<SeedResult>> {
    let mut results = Vec::with_capacity(DEFAULT_SEQUENCES.len());
    for &(prefix, template, description, reset_yearly) in DEFAULT_SEQUENCES {
        let def = SequenceDefinition::new(prefix, template, description, reset_yearly);
        let outcome = if force {
            let existed = service.get_sequence_definition(prefix).await?.is_some();
            match service.define_sequence(&def).await {
                Ok(_) if existed => SeedOutcome::Overwritten,
                Ok(_) => SeedOutcome::Created,
                // Issued prefixes keep their layout.
                Err(DatabaseError::Core(CoreError::Validation(reason))) => {
                    tracing::warn!(prefix, %reason, "kept existing sequence definition");
                    SeedOutcome::Kept
                }
                Err(error) => return Err(error.into()),
            }
        } else if service.ensure_sequence_definition(&def).await? {
            SeedOutcome::Created
        } else {
            SeedOutcome::Kept
        };
        results.push(SeedResult {
            name: prefix.to_string(),
            outcome,
        });
    }
    Ok(results)
}

pub async fn seed_settings(service: &ErpService, force: bool) -> anyhow::Result<Vec<SeedResult>> {
    let mut results = Vec::with_capacity(DEFAULT_SETTINGS.len());
    for &(key, value, description) in DEFAULT_SETTINGS {
        let outcome = if force {
            let existed = service.get_setting(key).await?.is_some();
            service.set_setting(key, value, description).await?;
            if existed {
                SeedOutcome::Overwritten
            } else {
                SeedOutcome::Created
            }
        } else if service.ensure_setting(key, value, description).await?.1 {
            SeedOutcome::Created
        } else {
            SeedOutcome::Kept
        };
        results.push(SeedResult {
            name: key.to_string(),
            outcome,
        });
    }
    Ok(results)
}
