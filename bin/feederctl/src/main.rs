//! ---
//! feeder_section: "05-interfaces"
//! feeder_subsection: "binary"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Command-line front end of the feeder topology compiler."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use feeder_common::config::{AppConfig, LoadedAppConfig};
use tracing::info;

mod compile;
mod inspect;

const CONFIG_CANDIDATES: [&str; 2] = ["feeder.toml", "config/feeder.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Compile distribution feeder records into simulation-engine scripts",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to FEEDER_CONFIG, then ./feeder.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile feeder tables and profile pools into an engine script.
    Compile(compile::CompileCommand),
    /// Print summary statistics of a feeder.
    Stats(inspect::StatsCommand),
    /// Translate a conductor letter code to its engine suffix (or back).
    Phase(inspect::PhaseCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile(cmd) => {
            let loaded = load_config(cli.config.as_ref())?;
            feeder_common::init_tracing("feederctl", &loaded.config.logging)?;
            if let Some(source) = &loaded.source {
                info!(config = %source.display(), "configuration loaded");
            }
            cmd.execute(loaded.config)
        }
        Commands::Stats(cmd) => {
            feeder_logging::init();
            cmd.execute()
        }
        Commands::Phase(cmd) => cmd.execute(),
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedAppConfig> {
    match explicit {
        Some(path) => Ok(LoadedAppConfig {
            config: AppConfig::from_path(path)?,
            source: Some(path.clone()),
        }),
        None => AppConfig::load_with_source(&CONFIG_CANDIDATES),
    }
}
