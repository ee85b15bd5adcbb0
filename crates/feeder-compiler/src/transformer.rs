//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Transformer topology selection and emission."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
//! A transformer record becomes either one standard engine transformer
//! (three-phase, split-phase or single-phase) or, when both windings share
//! the same rated voltage, a per-phase autotransformer regulator assembly.

use crate::engine::{DssCommand, Element, ElementClass, Value};
use crate::errors::{CompilerError, Result};
use crate::model::{TransformerRecord, WindingConnection};
use crate::phase::{BusRef, PhaseCode};

const JUMPER_IMPEDANCE_OHM: f64 = 0.0001;
const REGULATOR_PHASES: [(&str, u8); 3] = [("A", 1), ("B", 2), ("C", 3)];

/// Shape of the engine model chosen for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    ThreePhase,
    SplitPhase(PhaseCode),
    SinglePhase(PhaseCode),
    Regulator,
}

/// Decide how a record is modelled.
///
/// Equal winding voltages take precedence over the phase code. A missing phase
/// code means a whole-bus three-phase unit.
pub fn select_topology(record: &TransformerRecord) -> Result<Topology> {
    if record.is_autotransformer() {
        return Ok(Topology::Regulator);
    }
    let code = match record.conn_type.as_deref().map(str::trim) {
        None | Some("") => return Ok(Topology::ThreePhase),
        Some(code) => code,
    };
    match code.chars().count() {
        3 => {
            PhaseCode::parse(code)?;
            Ok(Topology::ThreePhase)
        }
        2 => Ok(Topology::SplitPhase(PhaseCode::parse(code)?)),
        1 => Ok(Topology::SinglePhase(PhaseCode::parse(code)?)),
        length => Err(CompilerError::UnsupportedTopology {
            record: record.substation_id.clone(),
            length,
        }),
    }
}

/// Tap-changer parameters applied to winding 1 of standard transformers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapSettings {
    pub num_taps: u32,
    pub tap: f64,
    pub min_tap: f64,
    pub max_tap: f64,
}

impl TapSettings {
    /// Off-load taps fitted to distribution substations.
    pub fn distribution(tap: Option<f64>) -> Self {
        Self {
            num_taps: 4,
            tap: tap.unwrap_or(1.0),
            min_tap: 1.028,
            max_tap: 1.137,
        }
    }
}

/// Engine-side placement of a transformer record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerSite {
    pub name: String,
    pub primary_bus: String,
    pub secondary_bus: String,
    pub taps: Option<TapSettings>,
}

impl TransformerSite {
    /// Network transformer fed straight from the source bus.
    pub fn network(record: &TransformerRecord) -> Self {
        Self {
            name: record.substation_id.clone(),
            primary_bus: record.bus1.clone(),
            secondary_bus: mv_node(&record.bus2),
            taps: None,
        }
    }

    /// In-line MV transformer between two MV nodes.
    pub fn medium_voltage(record: &TransformerRecord) -> Self {
        Self {
            name: record.substation_id.clone(),
            primary_bus: mv_node(&record.bus1),
            secondary_bus: mv_node(&record.bus2),
            taps: None,
        }
    }

    /// Distribution substation feeding the LV busbar of record `index`.
    pub fn distribution(record: &TransformerRecord, index: usize) -> Self {
        Self {
            name: format!("mv_f0_lv_{}", record.substation_id),
            primary_bus: mv_node(&record.bus1),
            secondary_bus: lv_busbar(index),
            taps: Some(TapSettings::distribution(record.wdg1_tap)),
        }
    }
}

pub fn mv_node(id: &str) -> String {
    format!("mv_f0_n{}", id)
}

pub fn lv_busbar(index: usize) -> String {
    format!("mv_f0_lv{}_busbar", index)
}

/// Commands produced for one record plus what the GIS layer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerEmission {
    pub topology: Topology,
    pub dss_name: String,
    pub capacity_kva: f64,
    pub commands: Vec<DssCommand>,
}

impl TransformerEmission {
    pub fn is_regulator(&self) -> bool {
        self.topology == Topology::Regulator
    }
}

/// Build every command for `record` placed at `site`.
///
/// Nothing is returned on error, so a failed record never leaves a partial
/// assembly in the stream.
pub fn emit_transformer(
    record: &TransformerRecord,
    site: &TransformerSite,
    regulation_range: f64,
) -> Result<TransformerEmission> {
    let topology = select_topology(record)?;
    match &topology {
        Topology::Regulator => emit_regulator(record, site, regulation_range),
        Topology::ThreePhase => {
            let command = three_phase(record, site)?;
            Ok(standard_emission(record, site, topology.clone(), command))
        }
        Topology::SplitPhase(code) => {
            let command = split_phase(record, site, code)?;
            Ok(standard_emission(record, site, topology.clone(), command))
        }
        Topology::SinglePhase(code) => {
            let command = single_phase(record, site, code)?;
            Ok(standard_emission(record, site, topology.clone(), command))
        }
    }
}

fn standard_emission(
    record: &TransformerRecord,
    site: &TransformerSite,
    topology: Topology,
    command: DssCommand,
) -> TransformerEmission {
    TransformerEmission {
        topology,
        dss_name: site.name.clone(),
        capacity_kva: record.kvas_primary,
        commands: vec![command],
    }
}

fn losses(element: Element, record: &TransformerRecord) -> Element {
    element
        .attr("XHL", record.xhl)
        .attr("%noloadloss", record.noloadloss)
        .attr("%loadloss", record.loadloss)
}

fn with_taps(mut element: Element, taps: Option<TapSettings>) -> Element {
    if let Some(taps) = taps {
        element.push("wdg", 1u8);
        element.push("numtaps", taps.num_taps);
        element.push("tap", taps.tap);
        element.push("maxtap", taps.max_tap);
        element.push("mintap", taps.min_tap);
    }
    element
}

fn connection(
    value: Option<WindingConnection>,
    record: &TransformerRecord,
    attribute: &'static str,
) -> Result<WindingConnection> {
    value.ok_or_else(|| CompilerError::MissingAttribute {
        table: "transformer",
        record: record.substation_id.clone(),
        attribute,
    })
}

fn three_phase(record: &TransformerRecord, site: &TransformerSite) -> Result<DssCommand> {
    let primary = connection(record.connection_primary, record, "Connection_Primary")?;
    let secondary = connection(record.connection_secondary, record, "Connection_Secondary")?;
    let buses = vec![
        BusRef::whole(site.primary_bus.as_str())?,
        BusRef::whole(site.secondary_bus.as_str())?,
    ];
    let element = Element::new(ElementClass::Transformer, site.name.as_str())
        .attr("phases", 3u8)
        .attr("windings", 2u8)
        .attr("buses", buses)
        .attr("conns", vec![primary.to_string(), secondary.to_string()])
        .attr("kVs", vec![record.kvs_primary, record.kvs_secondary])
        .attr("kVAs", vec![record.kvas_primary, record.kvas_secondary]);
    Ok(with_taps(losses(element, record), site.taps).into_new())
}

fn split_phase(
    record: &TransformerRecord,
    site: &TransformerSite,
    code: &PhaseCode,
) -> Result<DssCommand> {
    let buses = vec![
        BusRef::with_suffix(site.primary_bus.as_str(), code.suffix())?,
        BusRef::new(site.secondary_bus.as_str(), &[1, 0])?,
        BusRef::new(site.secondary_bus.as_str(), &[0, 2])?,
    ];
    let conns = vec![
        WindingConnection::Delta.to_string(),
        WindingConnection::Wye.to_string(),
        WindingConnection::Wye.to_string(),
    ];
    let element = Element::new(ElementClass::Transformer, site.name.as_str())
        .attr("phases", 1u8)
        .attr("windings", 3u8)
        .attr("buses", buses)
        .attr("conns", conns)
        .attr(
            "kVs",
            vec![record.kvs_primary, record.kvs_secondary, record.kvs_secondary],
        )
        .attr(
            "kVAs",
            vec![
                record.kvas_primary,
                record.kvas_secondary,
                record.kvas_secondary,
            ],
        );
    Ok(with_taps(losses(element, record), site.taps).into_new())
}

fn single_phase(
    record: &TransformerRecord,
    site: &TransformerSite,
    code: &PhaseCode,
) -> Result<DssCommand> {
    let buses = vec![
        BusRef::with_suffix(site.primary_bus.as_str(), code.suffix())?,
        BusRef::new(site.secondary_bus.as_str(), &[1])?,
    ];
    let conns = vec![
        WindingConnection::Wye.to_string(),
        WindingConnection::Wye.to_string(),
    ];
    let element = Element::new(ElementClass::Transformer, site.name.as_str())
        .attr("phases", 1u8)
        .attr("windings", 2u8)
        .attr("buses", buses)
        .attr("conns", conns)
        .attr("kVs", vec![record.kvs_primary, record.kvs_secondary])
        .attr("kVAs", vec![record.kvas_primary, record.kvas_secondary]);
    Ok(with_taps(losses(element, record), site.taps).into_new())
}

/// Capacity of the series winding of an autotransformer regulating +/- `range`
/// of a throughput rating, rounded to two decimals.
pub fn regulator_capacity_kva(throughput_kva: f64, range: f64) -> f64 {
    let capacity = range / (1.0 + range) * throughput_kva;
    (capacity * 100.0).round() / 100.0
}

fn emit_regulator(
    record: &TransformerRecord,
    site: &TransformerSite,
    regulation_range: f64,
) -> Result<TransformerEmission> {
    let kv = record.kvs_primary;
    let kva = regulator_capacity_kva(record.kvas_primary, regulation_range);
    let num_taps = record
        .wdg1_numtaps
        .ok_or_else(|| CompilerError::MissingAttribute {
            table: "mvtx",
            record: record.substation_id.clone(),
            attribute: "wdg1_numtaps",
        })?
        .saturating_sub(1);

    let mut commands = Vec::with_capacity(REGULATOR_PHASES.len() * 4);
    for (label, index) in REGULATOR_PHASES {
        let jumper = format!("Jumper_{}_{}", site.name, label);
        let unit = format!("{}_{}", site.name, label);

        commands.push(
            Element::new(ElementClass::Reactor, format!("{}_E", jumper))
                .attr("phases", 1u8)
                .attr("bus1", BusRef::new(site.primary_bus.as_str(), &[index])?)
                .attr("bus2", BusRef::new(jumper.as_str(), &[2])?)
                .attr("X", JUMPER_IMPEDANCE_OHM)
                .attr("R", JUMPER_IMPEDANCE_OHM)
                .into_new(),
        );
        commands.push(
            Element::new(ElementClass::Reactor, format!("{}_O", jumper))
                .attr("phases", 1u8)
                .attr("bus1", BusRef::new(jumper.as_str(), &[1])?)
                .attr("bus2", BusRef::new(site.secondary_bus.as_str(), &[index])?)
                .attr("X", JUMPER_IMPEDANCE_OHM)
                .attr("R", JUMPER_IMPEDANCE_OHM)
                .into_new(),
        );
        commands.push(
            Element::new(ElementClass::Transformer, unit.as_str())
                .attr("phases", 1u8)
                .attr("windings", 2u8)
                .attr("XHL", record.xhl)
                .attr("%noloadloss", record.noloadloss)
                .attr("%loadloss", record.loadloss)
                .attr("wdg", 1u8)
                .attr("bus", BusRef::new(jumper.as_str(), &[1, 0])?)
                .attr("kv", kv)
                .attr("kva", kva)
                .attr("wdg", 2u8)
                .attr("bus", BusRef::new(jumper.as_str(), &[1, 2])?)
                .attr("kv", kv / 10.0)
                .attr("kva", kva)
                .attr("maxtap", 1.0)
                .attr("mintap", -1.0)
                .attr("tap", 0.0)
                .attr("numtaps", num_taps)
                .into_new(),
        );
        commands.push(
            Element::new(ElementClass::RegControl, format!("Reg_{}_{}", site.name, label))
                .attr("transformer", unit.as_str())
                .attr("winding", 2u8)
                .attr("bus", BusRef::new(jumper.as_str(), &[1])?)
                .attr("vreg", 100.0)
                .attr("band", 3.0)
                .attr("ptratio", Value::Number(kv * 10.0))
                .attr("maxtapchange", 1u8)
                .into_new(),
        );
    }

    Ok(TransformerEmission {
        topology: Topology::Regulator,
        dss_name: site.name.clone(),
        capacity_kva: kva,
        commands,
    })
}
