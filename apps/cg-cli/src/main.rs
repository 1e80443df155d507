//! # cg-cli
//!
//! Command-line interface for the governance core.
//!
//! - `cg decide <request.json>` — run an intent through the decision pipeline
//! - `cg whynot` — query ledgered denial traces by action, tenant or time
//! - `cg canon import/promote/show/list` — manage canon items
//! - `cg ledger verify/tail` — inspect the hash-chained ledger
//! - `cg session complete` — ledger a finished agent session
//! - `cg invariants` — list the builtin invariant registry
//! - `cg equilibrium <plan.json>` — check agents' plans for interference

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cg_governor::GovernorConfig;
use tracing_subscriber::EnvFilter;

/// Governance core CLI: decisions, canon and the audit ledger.
#[derive(Parser)]
#[command(name = "cg", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Log output format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide an intent from a JSON decision request.
    Decide {
        /// Path to the request file.
        request: PathBuf,
        /// Evaluate without writing to the ledger.
        #[arg(long)]
        replay: bool,
        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Query ledgered denial traces.
    Whynot(commands::whynot::WhyNotArgs),
    /// Manage canon items.
    Canon {
        #[command(subcommand)]
        command: commands::canon::CanonCommands,
    },
    /// Inspect the ledger.
    Ledger {
        #[command(subcommand)]
        command: commands::ledger::LedgerCommands,
    },
    /// Record agent sessions.
    Session {
        #[command(subcommand)]
        command: commands::session::SessionCommands,
    },
    /// List the builtin invariants.
    Invariants {
        /// Print as JSON canon items.
        #[arg(long)]
        json: bool,
    },
    /// Check agents' planned actions for mutual interference.
    Equilibrium {
        /// JSON file with a list of agents and their planned actions.
        plan: PathBuf,
    },
}

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive("cg_governor=info".parse()?)
            .add_directive("cg_ledger=info".parse()?),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = GovernorConfig::load(&project_root)?;

    match &cli.command {
        Commands::Decide {
            request,
            replay,
            json,
        } => commands::decide::execute(&config, request, *replay, *json),
        Commands::Whynot(args) => commands::whynot::execute(args, &config),
        Commands::Canon { command } => commands::canon::execute(command, &config),
        Commands::Ledger { command } => commands::ledger::execute(command, &config),
        Commands::Session { command } => commands::session::execute(command, &config),
        Commands::Invariants { json } => commands::invariants::execute(*json),
        Commands::Equilibrium { plan } => commands::equilibrium::execute(plan),
    }
}
