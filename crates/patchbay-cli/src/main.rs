//! Patchbay CLI - inspect, resize, and check audio unit topologies.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "patchbay")]
#[command(author, version, about = "Patchbay audio unit topology CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the channel and buffer layout of a unit description
    Inspect(commands::inspect::InspectArgs),

    /// Replay a resize script against a unit
    Run(commands::run::RunArgs),

    /// Validate a unit (and optionally a script) and verify topology invariants
    Check(commands::check::CheckArgs),

    /// List unit descriptions in the user and system directories
    Units(commands::units::UnitsArgs),
}

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(args) => commands::inspect::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Units(args) => commands::units::run(args),
    }
}
