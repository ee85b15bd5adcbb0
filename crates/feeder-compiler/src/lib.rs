//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Topology compiler from feeder records to engine command scripts."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
pub mod compiler;
pub mod engine;
pub mod errors;
pub mod geo;
pub mod io;
pub mod lines;
pub mod loads;
pub mod model;
pub mod phase;
pub mod profiles;
pub mod reports;
pub mod source;
pub mod stages;
pub mod statistics;
pub mod transformer;

use std::path::Path;

use chrono::{DateTime, Utc};
use feeder_common::CompileConfig;
use feeder_logging::{log_system_event, LogContext, SystemEventOutcome};

use crate::{
    compiler::{CompileWarning, StageSummary},
    engine::CommandScript,
    geo::GeoLayer,
    profiles::{DayOfYear, ProfilePools, Season},
    reports::ReportExporter,
    source::RecordSource,
    statistics::FeederStatistics,
};

pub use compiler::FeederCompiler;
pub use engine::{CommandSink, DssCommand};
pub use errors::{CompilerError, Result};
pub use source::FeederRecords;

/// Everything a compile learned besides the commands themselves.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompileReport {
    pub timestamp: DateTime<Utc>,
    pub feeder: String,
    pub seed: u64,
    pub day: DayOfYear,
    pub date: String,
    pub season: Season,
    pub command_count: usize,
    pub stages: Vec<StageSummary>,
    pub warnings: Vec<CompileWarning>,
    pub statistics: FeederStatistics,
    pub geo: GeoLayer,
}

impl CompileReport {
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }
}

/// Compile `source` into an in-memory script and, when `report_dir` is given,
/// export the JSON reports there.
pub fn compile_to_script<S: RecordSource + ?Sized>(
    source: &S,
    pools: &ProfilePools,
    config: &CompileConfig,
    report_dir: Option<&Path>,
) -> Result<(CommandScript, CompileReport)> {
    let ctx = LogContext::new().with_feeder(source.feeder_name());
    let compiler = FeederCompiler::new(config.clone())?;
    let mut script = CommandScript::new();

    let report = match compiler.compile(source, pools, &mut script) {
        Ok(report) => report,
        Err(err) => {
            log_system_event(
                Some(&ctx),
                "compile.aborted",
                &err.to_string(),
                SystemEventOutcome::Fault,
            );
            return Err(err);
        }
    };

    if let Some(dir) = report_dir {
        report.exporter().export_all(dir)?;
    }

    log_system_event(
        Some(&ctx),
        "compile.finished",
        &format!(
            "{} commands, {} warnings",
            report.command_count,
            report.warnings.len()
        ),
        SystemEventOutcome::Success,
    );
    Ok((script, report))
}
