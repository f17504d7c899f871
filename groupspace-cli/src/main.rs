//! # groupspace CLI
//!
//! Drives an in-process namespace from YAML scenario files.

mod commands;
mod scenario;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "groupspace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Namespace configuration file, overriding the scenario's own `config`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a scenario and print its evaluations
    Run {
        /// Scenario file
        scenario: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Execute a scenario silently and print the resulting tree
    Tree {
        /// Scenario file
        scenario: PathBuf,
    },

    /// Validate a group path and print its normalised form
    Check {
        /// Community name
        community: String,

        /// Path such as `a/b/c`
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { scenario, json } => {
            commands::run_scenario(&scenario, cli.config.as_deref(), json)
        }
        Commands::Tree { scenario } => commands::print_tree(&scenario, cli.config.as_deref()),
        Commands::Check { community, path } => commands::check_path(&community, &path),
    }
}
