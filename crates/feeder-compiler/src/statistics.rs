//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Summary counts and conductor lengths of a feeder."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::source::{RecordSource, TableName};

const REGULATOR_MARKER: &str = "_REG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeederStatistics {
    pub residential_substations: usize,
    pub residential_customers: usize,
    pub non_residential_substations: usize,
    pub non_residential_customers: usize,
    pub mv_transformers: usize,
    pub regulators: usize,
    pub capacitors: usize,
    pub swer_lv_transformers: usize,
    pub mv_line_km: f64,
    pub mv_swer_line_km: f64,
    pub lv_line_km: f64,
    pub lv_swer_line_km: f64,
}

impl FeederStatistics {
    /// Tally whatever tables are present; absent tables count as empty.
    pub fn collect<S: RecordSource + ?Sized>(source: &S) -> Self {
        let mut stats = Self::default();

        if let Some(substations) = source.transformers(TableName::Lvtx) {
            stats.residential_substations = substations.iter().filter(|t| t.is_residential()).count();
            stats.non_residential_substations =
                substations.iter().filter(|t| t.is_commercial()).count();
            stats.swer_lv_transformers = substations
                .iter()
                .filter(|t| t.phase_code_len().is_some_and(|len| len != 3))
                .count();
        }

        if let Some(loads) = source.loads() {
            stats.residential_customers = loads.iter().filter(|l| l.phases == 1).count();
            stats.non_residential_customers = loads.iter().filter(|l| l.phases == 3).count();
        }

        if let Some(units) = source.transformers(TableName::Mvtx) {
            stats.regulators = units
                .iter()
                .filter(|t| t.substation_id.contains(REGULATOR_MARKER))
                .count();
            stats.mv_transformers = units.len() - stats.regulators;
        }

        if let Some(capacitors) = source.capacitors() {
            stats.capacitors = capacitors.iter().filter(|c| c.phases == 3).count();
        }

        if let Some(lines) = source.mv_lines() {
            let live = || lines.iter().filter(|l| !l.is_deletion_marker());
            stats.mv_line_km = round2(live().map(|l| l.length).sum());
            stats.mv_swer_line_km = round2(live().filter(|l| l.phases == 1).map(|l| l.length).sum());
        }

        if let Some(lines) = source.lv_lines() {
            let total_m: f64 = lines.iter().map(|l| l.length).sum();
            let swer_m: f64 = lines.iter().filter(|l| l.phases == 1).map(|l| l.length).sum();
            stats.lv_line_km = round2(total_m / 1000.0);
            stats.lv_swer_line_km = round2(swer_m / 1000.0);
        }

        stats
    }

    /// Labelled rows with zero-valued entries left out.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let counts = [
            ("LV residential substations", self.residential_substations),
            ("LV residential customers", self.residential_customers),
            ("LV non-residential substations", self.non_residential_substations),
            ("LV non-residential customers", self.non_residential_customers),
            ("MV/MV transformers", self.mv_transformers),
            ("Voltage regulators", self.regulators),
            ("MV capacitors", self.capacitors),
            ("SWER LV transformers", self.swer_lv_transformers),
        ];
        let lengths = [
            ("MV conductor length", self.mv_line_km),
            ("MV SWER conductor length", self.mv_swer_line_km),
            ("LV conductor length", self.lv_line_km),
            ("LV SWER conductor length", self.lv_swer_line_km),
        ];
        counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(label, count)| (label, count.to_string()))
            .chain(
                lengths
                    .into_iter()
                    .filter(|(_, km)| *km > 0.0)
                    .map(|(label, km)| (label, format!("{:.2} km", km))),
            )
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
