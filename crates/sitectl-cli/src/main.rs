//! sitectl CLI
//!
//! Command-line front end for the release engine. Results are printed to
//! stdout as pretty JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use sitectl_core::config::Config;
use sitectl_core::errors::SiteError;
use sitectl_core::logging_facility;
use sitectl_engine::commands::engine_command::apply_engine_command;
use sitectl_engine::{ReleaseEngine, SiteToolchain};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "sitectl")]
#[command(about = "sitectl - static site release management", long_about = None)]
struct Cli {
    /// Path to sitectl.toml (defaults to $SITECTL_CONFIG, then ./sitectl.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile desired state from a bundle directory
    Apply(commands::apply::ApplyArgs),
    /// Build and activate a release
    Build(commands::release::TargetArgs),
    /// Roll back to the previous healthy release
    Rollback(commands::release::TargetArgs),
    /// Copy the active release of one environment into another
    Promote(commands::release::PromoteArgs),
    /// List an environment's release history
    Releases(commands::release::TargetArgs),
    /// Show the audit log of a website or one of its environments
    Logs(commands::logs::LogsArgs),
    /// Repair environments after an unclean shutdown
    Recover,
}

fn run(cli: Cli) -> Result<(), SiteError> {
    let config = Config::discover(cli.config.as_deref())?;
    logging_facility::init(config.log_profile);

    let cmd = match cli.command {
        Commands::Apply(args) => commands::apply::to_command(args)?,
        Commands::Build(args) => commands::release::build(args),
        Commands::Rollback(args) => commands::release::rollback(args),
        Commands::Promote(args) => commands::release::promote(args),
        Commands::Releases(args) => commands::release::releases(args),
        Commands::Logs(args) => commands::logs::to_command(args)?,
        Commands::Recover => commands::release::recover(),
    };

    let mut engine = ReleaseEngine::open(&config, SiteToolchain::default())?;
    let result = apply_engine_command(cmd, &mut engine)?;
    commands::print_json(&result)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(commands::exit_code(&e));
    }
}
