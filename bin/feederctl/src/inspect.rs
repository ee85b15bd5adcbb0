//! ---
//! feeder_section: "05-interfaces"
//! feeder_subsection: "binary"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Read-only inspection subcommands."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use feeder_compiler::{io::load_feeder, phase::PhaseCode, statistics::FeederStatistics};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatsFormat {
    Json,
    Text,
}

#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Directory of `<table>.csv` files, or a JSON/YAML bundle.
    #[arg(long, value_name = "PATH")]
    tables: PathBuf,

    #[arg(long, value_enum, default_value_t = StatsFormat::Json)]
    format: StatsFormat,
}

impl StatsCommand {
    pub fn execute(self) -> Result<()> {
        let records = load_feeder(&self.tables)
            .with_context(|| format!("failed to load feeder tables from {}", self.tables.display()))?;
        let stats = FeederStatistics::collect(&records);
        match self.format {
            StatsFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            StatsFormat::Text => {
                let width = stats
                    .rows()
                    .iter()
                    .map(|(label, _)| label.len())
                    .max()
                    .unwrap_or(0);
                for (label, value) in stats.rows() {
                    println!("{:<width$}  {}", label, value, width = width);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct PhaseCommand {
    /// Letter code such as `RB`, or a dotted suffix with `--reverse`.
    code: String,

    /// Translate an engine suffix (`1.3`) back to letters.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    reverse: bool,
}

impl PhaseCommand {
    pub fn execute(self) -> Result<()> {
        let code = if self.reverse {
            PhaseCode::from_suffix(self.code.trim())
        } else {
            PhaseCode::parse(&self.code)
        }
        .with_context(|| format!("cannot translate '{}'", self.code))?;
        if self.reverse {
            println!("{}", code.letters());
        } else {
            println!("{}", code.suffix());
        }
        Ok(())
    }
}
