use clap::{Args, Subcommand, ValueEnum};

use crate::cli::subcommands::{AttachCommands, SeqCommands, SettingsCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Create the database and seed default sequences and settings.
    Init(InitArgs),
    /// Query the audit log, newest first.
    Audit(AuditArgs),
    /// Reference number sequences.
    Seq {
        #[command(subcommand)]
        action: SeqCommands,
    },
    /// System settings.
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Files attached to records.
    Attach {
        #[command(subcommand)]
        action: AttachCommands,
    },
    /// Print the JSON schema of a stored record type.
    Schema(SchemaArgs),
}

/// Arguments for `erp init`.
#[derive(Clone, Debug, Args)]
pub struct InitArgs {
    /// Overwrite existing sequence definitions and settings with the defaults.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `erp audit`.
#[derive(Clone, Debug, Args)]
pub struct AuditArgs {
    /// Only entries credited to this actor.
    #[arg(long = "by", value_name = "ACTOR")]
    pub actor: Option<String>,
    /// create, update, delete or view.
    #[arg(long)]
    pub action: Option<String>,
    #[arg(long)]
    pub entity_kind: Option<String>,
    #[arg(long)]
    pub entity_id: Option<i64>,
    /// Inclusive lower bound (RFC 3339 timestamp or YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<String>,
    /// Exclusive upper bound (RFC 3339 timestamp or YYYY-MM-DD).
    #[arg(long)]
    pub until: Option<String>,
}

/// Record types with a published schema.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SchemaType {
    Attachment,
    AuditEntry,
    SequenceCounter,
    SequenceDefinition,
    Setting,
}

/// Arguments for `erp schema`.
#[derive(Clone, Debug, Args)]
pub struct SchemaArgs {
    pub type_name: SchemaType,
}
