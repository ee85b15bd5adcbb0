//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "JSON export of compile reports and GIS annotations."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::{fs, path::Path};

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::{
    compiler::{CompileWarning, StageSummary},
    errors::Result,
    geo::GeoLayer,
    profiles::Season,
    statistics::FeederStatistics,
    CompileReport,
};

pub const SUMMARY_FILE: &str = "compile_summary.json";
pub const GEO_FILE: &str = "geo_layer.json";

#[derive(Debug)]
pub struct ReportExporter<'a> {
    report: &'a CompileReport,
}

impl<'a> ReportExporter<'a> {
    pub fn new(report: &'a CompileReport) -> Self {
        Self { report }
    }

    pub fn export_all(&self, output_dir: &Path) -> Result<()> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let timestamp = self.report.timestamp.to_rfc3339();
        let feeder = self.report.feeder.clone();

        let view = SummaryView::from(self.report);
        let summary = ReportEnvelope::new(&timestamp, feeder.clone(), summary_schema(), &view);
        let geo = ReportEnvelope::new(&timestamp, feeder, geo_schema(), &self.report.geo);

        write_json(output_dir.join(SUMMARY_FILE), &summary)?;
        write_json(output_dir.join(GEO_FILE), &geo)?;

        info!("Reports exported to {}", output_dir.display());
        Ok(())
    }
}

/// Report contents minus the GIS annotations, which get their own file.
#[derive(Debug, Serialize)]
struct SummaryView<'a> {
    seed: u64,
    day: u16,
    date: &'a str,
    season: Season,
    command_count: usize,
    stages: &'a [StageSummary],
    warnings: &'a [CompileWarning],
    statistics: &'a FeederStatistics,
}

impl<'a> From<&'a CompileReport> for SummaryView<'a> {
    fn from(report: &'a CompileReport) -> Self {
        Self {
            seed: report.seed,
            day: report.day.ordinal(),
            date: &report.date,
            season: report.season,
            command_count: report.command_count,
            stages: &report.stages,
            warnings: &report.warnings,
            statistics: &report.statistics,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: &'a str,
    feeder: String,
    schema: serde_json::Value,
    data: &'a T,
}

impl<'a, T: Serialize> ReportEnvelope<'a, T> {
    fn new(timestamp: &'a str, feeder: String, schema: serde_json::Value, data: &'a T) -> Self {
        Self {
            timestamp,
            feeder,
            schema,
            data,
        }
    }
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn summary_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "CompileSummary",
        "type": "object",
        "properties": {
            "seed": {"type": "integer"},
            "day": {"type": "integer", "minimum": 1, "maximum": 365},
            "date": {"type": "string"},
            "season": {"enum": ["summer", "autumn", "winter", "spring"]},
            "command_count": {"type": "integer"},
            "stages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "stage": {"type": "string"},
                        "records": {"type": "integer"},
                        "commands": {"type": "integer"},
                        "skipped": {"type": "integer"}
                    },
                    "required": ["stage", "records", "commands", "skipped"]
                }
            },
            "warnings": {"type": "array"},
            "statistics": {"type": "object"}
        },
        "required": ["seed", "day", "command_count", "stages", "warnings"]
    })
}

fn geo_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "GeoLayer",
        "type": "object",
        "properties": {
            "layers": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "dss_name": {"type": "string"},
                            "ampacity": {"type": "number"},
                            "capacity_kva": {"type": "number"}
                        },
                        "required": ["dss_name"]
                    }
                }
            }
        },
        "required": ["layers"]
    })
}

/// Read a previously exported GIS file back.
pub fn read_geo_layer(path: impl AsRef<Path>) -> Result<GeoLayer> {
    #[derive(serde::Deserialize)]
    struct Envelope {
        data: GeoLayer,
    }
    let data = fs::read_to_string(path)?;
    let envelope: Envelope = serde_json::from_str(&data)?;
    Ok(envelope.data)
}
