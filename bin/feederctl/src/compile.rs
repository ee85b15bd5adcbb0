//! ---
//! feeder_section: "05-interfaces"
//! feeder_subsection: "binary"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "The compile subcommand."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use feeder_common::AppConfig;
use feeder_compiler::{
    compile_to_script,
    engine::WriterSink,
    io::{load_feeder, load_profile_pools},
    CompileReport,
};
use feeder_logging::{log_system_event, LogContext, SystemEventOutcome};

#[derive(Debug, Args)]
pub struct CompileCommand {
    /// Directory of `<table>.csv` files, or a JSON/YAML bundle.
    #[arg(long, value_name = "PATH")]
    tables: PathBuf,

    /// Residential profile pool (JSON nested arrays or long-format CSV).
    #[arg(long, value_name = "FILE")]
    residential: PathBuf,

    /// Commercial profile pool (JSON nested arrays or long-format CSV).
    #[arg(long, value_name = "FILE")]
    commercial: PathBuf,

    /// Override the session seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Fix the day of year (1-365) instead of drawing it.
    #[arg(long)]
    day: Option<u16>,

    /// Override the commercial profile draw cap.
    #[arg(long = "max-draws", value_name = "N")]
    max_draws: Option<u32>,

    /// Script destination (defaults to `output.script`).
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Report directory (defaults to `output.report_dir`).
    #[arg(long = "report-dir", value_name = "DIR")]
    report_dir: Option<PathBuf>,

    /// Print the script to stdout instead of writing a file. Output appears
    /// only once the compile has succeeded.
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "output")]
    stdout: bool,
}

impl CompileCommand {
    pub fn execute(self, mut config: AppConfig) -> Result<()> {
        if let Some(seed) = self.seed {
            config.compile.seed = seed;
        }
        if self.day.is_some() {
            config.compile.day = self.day;
        }
        if let Some(max_draws) = self.max_draws {
            config.compile.max_profile_draws = max_draws;
        }
        config
            .validate()
            .context("invalid compile options")?;

        let records = load_feeder(&self.tables)
            .with_context(|| format!("failed to load feeder tables from {}", self.tables.display()))?;
        let pools = load_profile_pools(&self.residential, &self.commercial)
            .context("failed to load profile pools")?;
        let report_dir = self
            .report_dir
            .clone()
            .unwrap_or_else(|| config.output.report_dir.clone());

        let (script, report) = compile_to_script(&records, &pools, &config.compile, Some(&report_dir))?;

        // Nothing reaches stdout unless the whole compile succeeded.
        if self.stdout {
            let stdout = io::stdout();
            let mut sink = WriterSink::new(stdout.lock());
            script.replay(&mut sink)?;
            let written = sink.written();
            sink.into_inner().flush()?;
            log_streamed(&report, written);
            return Ok(());
        }

        let output = self.output.unwrap_or(config.output.script);
        script
            .write_to(&output)
            .with_context(|| format!("failed to write script to {}", output.display()))?;
        eprintln!(
            "{}: {} commands written to {} (day {}, {}, {}), {} warnings",
            report.feeder,
            report.command_count,
            output.display(),
            report.day,
            report.date,
            report.season,
            report.warnings.len()
        );
        Ok(())
    }
}

fn log_streamed(report: &CompileReport, written: usize) {
    let ctx = LogContext::new().with_feeder(&report.feeder);
    log_system_event(
        Some(&ctx),
        "compile.streamed",
        &format!("{} commands streamed", written),
        SystemEventOutcome::Success,
    );
}
