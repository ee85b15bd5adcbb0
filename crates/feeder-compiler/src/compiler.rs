//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Stage-ordered orchestration of a feeder compile."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
//! Drives every stage in [`Stage::ORDER`] against a record source, pushes the
//! resulting commands into a [`CommandSink`] and collects the compile report.

use chrono::Utc;
use feeder_common::CompileConfig;
use feeder_logging::{feeder_debug, feeder_info, feeder_warn, LogContext};
use serde::{Deserialize, Serialize};

use crate::engine::{CommandSink, DssCommand, Element, ElementClass};
use crate::errors::{CompilerError, Result};
use crate::geo::{GeoAnnotation, GeoLayer, GeoLayerKind};
use crate::lines::{emit_line_code, emit_lv_line, emit_mv_line, LineCodeIndex};
use crate::loads::{capacitor_name, emit_capacitor, emit_load};
use crate::model::TransformerRecord;
use crate::profiles::{DayOfYear, ProfilePools, ProfileSampler};
use crate::source::{require, RecordSource, TableName};
use crate::stages::{Stage, StageCursor};
use crate::statistics::FeederStatistics;
use crate::transformer::{emit_transformer, TransformerEmission, TransformerSite};
use crate::CompileReport;

const SOURCE_BUS: &str = "sourcebus";

/// Non-fatal findings collected during a compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileWarning {
    OptionalTableAbsent {
        table: TableName,
    },
    RecordSkipped {
        stage: Stage,
        record: usize,
        id: String,
        reason: String,
    },
}

/// Per-stage tallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub records: usize,
    pub commands: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct FeederCompiler {
    config: CompileConfig,
}

impl FeederCompiler {
    pub fn new(config: CompileConfig) -> Result<Self> {
        if let Some(day) = config.day {
            DayOfYear::new(day)?;
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Compile `source` into `sink`. Required-stage failures abort the compile;
    /// commands already submitted stay in the sink.
    pub fn compile<S, K>(
        &self,
        source: &S,
        pools: &ProfilePools,
        sink: &mut K,
    ) -> Result<CompileReport>
    where
        S: RecordSource + ?Sized,
        K: CommandSink + ?Sized,
    {
        let day = self.config.day.map(DayOfYear::new).transpose()?;
        let sampler = ProfileSampler::new(
            pools,
            self.config.seed,
            day,
            self.config.max_profile_draws,
        );
        let mut session = Session {
            config: &self.config,
            source,
            sink,
            sampler,
            cursor: StageCursor::new(),
            geo: GeoLayer::new(),
            warnings: Vec::new(),
            stages: Vec::with_capacity(Stage::ORDER.len()),
            emitted: 0,
        };

        let day = session.sampler.day();
        feeder_info!(
            context = LogContext::new().with_feeder(source.feeder_name()),
            "compile started: seed {} day {} ({}, {})",
            self.config.seed,
            day,
            day.date_label(),
            day.season()
        );

        for stage in Stage::ORDER {
            session.run(stage)?;
        }

        Ok(CompileReport {
            timestamp: Utc::now(),
            feeder: source.feeder_name().to_owned(),
            seed: self.config.seed,
            day,
            date: day.date_label(),
            season: day.season(),
            command_count: session.emitted,
            stages: session.stages,
            warnings: session.warnings,
            statistics: FeederStatistics::collect(source),
            geo: session.geo,
        })
    }
}

struct Session<'a, S: RecordSource + ?Sized, K: CommandSink + ?Sized> {
    config: &'a CompileConfig,
    source: &'a S,
    sink: &'a mut K,
    sampler: ProfileSampler<'a>,
    cursor: StageCursor,
    geo: GeoLayer,
    warnings: Vec<CompileWarning>,
    stages: Vec<StageSummary>,
    emitted: usize,
}

#[derive(Default)]
struct Tally {
    records: usize,
    commands: usize,
    skipped: usize,
}

impl<'a, S: RecordSource + ?Sized, K: CommandSink + ?Sized> Session<'a, S, K> {
    fn run(&mut self, stage: Stage) -> Result<()> {
        self.cursor.enter(stage)?;
        let source = self.source;
        let ctx = LogContext::new()
            .with_feeder(source.feeder_name())
            .with_stage(stage.as_str());

        if stage.is_optional() {
            if let Some(table) = stage.table().filter(|table| !source.has_table(*table)) {
                feeder_info!(context = ctx, "optional table {} absent, stage skipped", table);
                self.warnings
                    .push(CompileWarning::OptionalTableAbsent { table });
                self.stages.push(StageSummary {
                    stage,
                    records: 0,
                    commands: 0,
                    skipped: 0,
                });
                return Ok(());
            }
        }

        let tally = match stage {
            Stage::Setup => self.setup()?,
            Stage::Source => self.source_impedance()?,
            Stage::MvTransformers => self.network_transformers()?,
            Stage::LineCodes => self.line_codes()?,
            Stage::MvLines => self.mv_lines()?,
            Stage::Capacitors => self.capacitors()?,
            Stage::Regulators => self.regulators()?,
            Stage::LvTransformers => self.lv_transformers()?,
            Stage::LvLines => self.lv_lines()?,
            Stage::Loads => self.loads()?,
            Stage::Directives => self.directives()?,
        };

        feeder_info!(
            context = ctx,
            "stage complete: {} records, {} commands, {} skipped",
            tally.records,
            tally.commands,
            tally.skipped
        );
        self.stages.push(StageSummary {
            stage,
            records: tally.records,
            commands: tally.commands,
            skipped: tally.skipped,
        });
        Ok(())
    }

    fn submit_all(&mut self, commands: Vec<DssCommand>, tally: &mut Tally) -> Result<()> {
        for command in commands {
            self.sink.submit(command)?;
            self.emitted += 1;
            tally.commands += 1;
        }
        Ok(())
    }

    fn skip(&mut self, stage: Stage, record: usize, id: &str, err: &CompilerError, tally: &mut Tally) {
        let source = self.source;
        let ctx = LogContext::new()
            .with_feeder(source.feeder_name())
            .with_stage(stage.as_str())
            .with_record(record);
        feeder_warn!(context = ctx, "record {} skipped: {}", id, err);
        self.warnings.push(CompileWarning::RecordSkipped {
            stage,
            record,
            id: id.to_owned(),
            reason: err.to_string(),
        });
        tally.skipped += 1;
    }

    fn setup(&mut self) -> Result<Tally> {
        let mut tally = Tally::default();
        self.submit_all(
            vec![
                DssCommand::Clear,
                DssCommand::set("DefaultBaseFrequency", self.config.base_frequency_hz),
            ],
            &mut tally,
        )?;
        Ok(tally)
    }

    fn source_impedance(&mut self) -> Result<Tally> {
        let mut tally = Tally::default();
        let feeder = self.source.feeder_name();
        let source = &self.config.source;
        let circuit = Element::new(ElementClass::Circuit, circuit_name(feeder))
            .attr("basekv", source.basekv)
            .attr("pu", source.pu)
            .attr("angle", source.angle)
            .attr("phases", 3u8)
            .attr("R1", source.r1)
            .attr("X1", source.x1)
            .attr("R0", source.r0)
            .attr("X0", source.x0)
            .into_new();
        let vsource = Element::new(ElementClass::Vsource, "source")
            .attr("bus1", SOURCE_BUS)
            .attr("basekv", source.basekv)
            .attr("pu", source.pu)
            .attr("angle", source.angle)
            .attr("R1", source.r1)
            .attr("X1", source.x1)
            .attr("R0", source.r0)
            .attr("X0", source.vsource_x0())
            .into_edit();
        self.submit_all(vec![circuit, vsource], &mut tally)?;
        Ok(tally)
    }

    fn network_transformers(&mut self) -> Result<Tally> {
        let source = self.source;
        let records = require(source.transformers(TableName::MvNetTxs), TableName::MvNetTxs)?;
        self.transformers(records, GeoLayerKind::MvTx, |record, _| {
            TransformerSite::network(record)
        })
    }

    fn lv_transformers(&mut self) -> Result<Tally> {
        let source = self.source;
        let records = require(source.transformers(TableName::Lvtx), TableName::Lvtx)?;
        self.transformers(records, GeoLayerKind::MvlvTxs, TransformerSite::distribution)
    }

    fn transformers(
        &mut self,
        records: &[TransformerRecord],
        layer: GeoLayerKind,
        site: impl Fn(&TransformerRecord, usize) -> TransformerSite,
    ) -> Result<Tally> {
        let mut tally = Tally::default();
        for (index, record) in records.iter().enumerate() {
            let emission = emit_transformer(record, &site(record, index), self.config.regulation_range)?;
            self.annotate_transformer(layer, index, &emission);
            self.submit_all(emission.commands, &mut tally)?;
            tally.records += 1;
        }
        Ok(tally)
    }

    fn annotate_transformer(&mut self, layer: GeoLayerKind, index: usize, emission: &TransformerEmission) {
        feeder_debug!(
            context = LogContext::new().with_record(index),
            "transformer {} as {:?}",
            emission.dss_name,
            emission.topology
        );
        self.geo.annotate(
            layer,
            index,
            GeoAnnotation::named(emission.dss_name.as_str()).with_capacity(emission.capacity_kva),
        );
    }

    fn line_codes(&mut self) -> Result<Tally> {
        let source = self.source;
        let records = require(source.line_codes(), TableName::Linecodes)?;
        let mut tally = Tally::default();
        for record in records {
            self.submit_all(vec![emit_line_code(record)], &mut tally)?;
            tally.records += 1;
        }
        Ok(tally)
    }

    fn mv_lines(&mut self) -> Result<Tally> {
        let source = self.source;
        let lines = require(source.mv_lines(), TableName::Lines)?;
        let codes = LineCodeIndex::new(require(source.line_codes(), TableName::Linecodes)?);
        let mut tally = Tally::default();
        for (index, line) in lines.iter().enumerate() {
            tally.records += 1;
            match emit_mv_line(line, &codes)? {
                Some(emission) => {
                    self.geo.annotate(GeoLayerKind::MvLines, index, emission.annotation);
                    self.submit_all(vec![emission.command], &mut tally)?;
                }
                None => tally.skipped += 1,
            }
        }
        Ok(tally)
    }

    fn capacitors(&mut self) -> Result<Tally> {
        let source = self.source;
        let records = require(source.capacitors(), TableName::Mvcaps)?;
        let mut tally = Tally::default();
        for (index, record) in records.iter().enumerate() {
            tally.records += 1;
            match emit_capacitor(record) {
                Ok(command) => {
                    self.geo.annotate(
                        GeoLayerKind::Caps,
                        index,
                        GeoAnnotation::named(capacitor_name(record)),
                    );
                    self.submit_all(vec![command], &mut tally)?;
                }
                Err(err) => self.skip(Stage::Capacitors, index, &record.element_id, &err, &mut tally),
            }
        }
        Ok(tally)
    }

    fn regulators(&mut self) -> Result<Tally> {
        let source = self.source;
        let records = require(source.transformers(TableName::Mvtx), TableName::Mvtx)?;
        let mut tally = Tally::default();
        let mut control_limit_set = false;
        for (index, record) in records.iter().enumerate() {
            tally.records += 1;
            let site = TransformerSite::medium_voltage(record);
            match emit_transformer(record, &site, self.config.regulation_range) {
                Ok(emission) => {
                    if emission.is_regulator() && !control_limit_set {
                        self.submit_all(vec![DssCommand::set("maxcontroliter", 100u32)], &mut tally)?;
                        control_limit_set = true;
                    }
                    self.annotate_transformer(GeoLayerKind::MvMvTxs, index, &emission);
                    self.submit_all(emission.commands, &mut tally)?;
                }
                Err(err) => self.skip(Stage::Regulators, index, &record.substation_id, &err, &mut tally),
            }
        }
        Ok(tally)
    }

    fn lv_lines(&mut self) -> Result<Tally> {
        let source = self.source;
        let lines = require(source.lv_lines(), TableName::LvLines)?;
        let codes = LineCodeIndex::new(source.line_codes().unwrap_or(&[]));
        let mut tally = Tally::default();
        for (index, line) in lines.iter().enumerate() {
            let emission = emit_lv_line(line, &codes)?;
            self.geo.annotate(GeoLayerKind::LvLines, index, emission.annotation);
            self.submit_all(vec![emission.command], &mut tally)?;
            tally.records += 1;
        }
        Ok(tally)
    }

    fn loads(&mut self) -> Result<Tally> {
        let source = self.source;
        let loads = require(source.loads(), TableName::LvLoads)?;
        let mut tally = Tally::default();
        for (index, load) in loads.iter().enumerate() {
            let mut commands = vec![emit_load(load)?];
            let bound = self.sampler.sample(index, load)?;
            commands.extend(bound.commands(&load.load_name));
            self.submit_all(commands, &mut tally)?;
            tally.records += 1;
        }
        let day = self.sampler.day();
        feeder_info!(
            context = LogContext::new()
                .with_feeder(source.feeder_name())
                .with_stage(Stage::Loads.as_str()),
            "profiles bound for {} ({}, {})",
            day,
            day.date_label(),
            day.season()
        );
        Ok(tally)
    }

    fn directives(&mut self) -> Result<Tally> {
        let mut tally = Tally::default();
        self.submit_all(
            vec![
                DssCommand::set("VoltageBases", self.config.voltage_bases_kv.clone()),
                DssCommand::CalcVoltageBases,
            ],
            &mut tally,
        )?;
        Ok(tally)
    }
}

/// Engine circuit names cannot carry whitespace or dots.
fn circuit_name(feeder: &str) -> String {
    let name: String = feeder
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "circuit".to_owned()
    } else {
        name
    }
}
