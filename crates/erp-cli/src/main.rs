use anyhow::Context;
use clap::Parser;

use erp_core::actor::{self, ActorContext, ActorId};

mod cli;
mod commands;
mod context;
mod output;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("erp error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let flags = cli.global_flags();

    if let cli::Commands::Schema(args) = &cli.command {
        return commands::schema::handle(args, &flags);
    }

    let mut config =
        erp_config::ErpConfig::load_with_dotenv().context("failed to load configuration")?;
    if let Some(db) = &flags.db {
        config.database.path.clone_from(db);
    }

    let unit_of_work = actor_context(&cli.command, &flags, &config);
    let ctx = context::AppContext::init(config)
        .await
        .context("failed to initialize college ERP application context")?;

    actor::scope(
        unit_of_work,
        commands::dispatch::dispatch(cli.command, &ctx, &flags),
    )
    .await
}

/// `--actor` (or `ERP_ACTOR`), then `general.actor`. `init` falls back to a
/// system actor, everything else to anonymous.
fn actor_context(
    command: &cli::Commands,
    flags: &cli::GlobalFlags,
    config: &erp_config::ErpConfig,
) -> ActorContext {
    let named = flags
        .actor
        .as_deref()
        .map(str::trim)
        .filter(|actor| !actor.is_empty())
        .or_else(|| config.general.actor());
    match (named, command) {
        (Some(actor), _) => ActorContext::for_actor(actor),
        (None, cli::Commands::Init(_)) => ActorContext::for_actor(ActorId::system("init")),
        (None, _) => ActorContext::anonymous(),
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("ERP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
