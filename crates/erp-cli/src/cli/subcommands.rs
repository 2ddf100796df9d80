use clap::Subcommand;

/// Reference number commands.
#[derive(Clone, Debug, Subcommand)]
pub enum SeqCommands {
    /// Issue the next number for a prefix.
    Next {
        prefix: String,
        /// Calendar year (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,
        /// Draw from the perpetual counter instead of the yearly one.
        #[arg(long)]
        no_reset_yearly: bool,
    },
    /// Create or replace the definition of a prefix.
    Define {
        prefix: String,
        /// Code template, e.g. "{prefix}/{year:04d}/{seq:05d}".
        #[arg(long)]
        template: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Keep one counter across all years.
        #[arg(long)]
        no_reset_yearly: bool,
    },
    /// List counters.
    List {
        /// Only counters for this prefix.
        #[arg(long)]
        prefix: Option<String>,
    },
}

/// System setting commands.
#[derive(Clone, Debug, Subcommand)]
pub enum SettingsCommands {
    /// Show one setting.
    Get { key: String },
    /// Create or update a setting.
    Set {
        key: String,
        value: String,
        /// Empty keeps the stored description.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List all settings.
    List,
}

/// Attachment commands. Targets are named by entity kind and id.
#[derive(Clone, Debug, Subcommand)]
pub enum AttachCommands {
    /// Record a file against a record.
    Add {
        entity_kind: String,
        entity_id: i64,
        file_path: String,
        /// Defaults to the file name.
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        label: String,
        /// File size in bytes.
        #[arg(long)]
        size: Option<i64>,
        #[arg(long, default_value = "")]
        mime_type: String,
    },
    /// List the files attached to a record, newest first.
    List { entity_kind: String, entity_id: i64 },
    /// Detach a file.
    Remove { id: i64 },
}
