//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Line-code, MV line and LV line emission."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::engine::{DssCommand, Element, ElementClass};
use crate::errors::{CompilerError, Result};
use crate::geo::GeoAnnotation;
use crate::model::{LineCodeRecord, LineRecord, LvLineRecord};
use crate::phase::BusRef;
use crate::transformer::mv_node;

const LINECODE_PREFIX: &str = "lc_";

pub fn linecode_name(id: &str) -> String {
    format!("{}{}", LINECODE_PREFIX, id)
}

/// Line codes by identifier, for ampacity and existence lookups.
#[derive(Debug, Default)]
pub struct LineCodeIndex<'a> {
    by_id: HashMap<&'a str, &'a LineCodeRecord>,
}

impl<'a> LineCodeIndex<'a> {
    /// The first row of a repeated identifier wins; later rows are ignored
    /// with a warning.
    pub fn new(records: &'a [LineCodeRecord]) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            match by_id.entry(record.linecode_id.as_str()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(_) => {
                    warn!(linecode = %record.linecode_id, "duplicate line code ignored");
                }
            }
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a LineCodeRecord> {
        self.by_id.get(id).copied()
    }

    /// Resolve an engine linecode name (`lc_<id>`) or a bare identifier.
    pub fn resolve(&self, name: &str) -> Option<&'a LineCodeRecord> {
        let id = name.strip_prefix(LINECODE_PREFIX).unwrap_or(name);
        self.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

pub fn emit_line_code(record: &LineCodeRecord) -> DssCommand {
    Element::new(ElementClass::Linecode, linecode_name(&record.linecode_id))
        .attr("nphases", record.phases)
        .attr("R1", record.r1)
        .attr("X1", record.x1)
        .attr("B1", record.b1)
        .attr("R0", record.r0)
        .attr("X0", record.x0)
        .attr("B0", record.b0)
        .attr("units", record.units.as_str())
        .attr("normamp", record.effective_ampacity())
        .into_new()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineEmission {
    pub command: DssCommand,
    pub annotation: GeoAnnotation,
}

/// Emit an MV line. Deletion markers yield `Ok(None)`.
pub fn emit_mv_line(record: &LineRecord, codes: &LineCodeIndex<'_>) -> Result<Option<LineEmission>> {
    if record.is_deletion_marker() {
        debug!(line = %record.line_number, "skipping deleted line");
        return Ok(None);
    }
    let key = record.linecode_key();
    let code = codes
        .get(&key)
        .ok_or_else(|| CompilerError::UnknownLineCode {
            line: record.line_number.clone(),
            linecode: key.clone(),
        })?;
    let name = format!("mv_f0_l{}", record.line_number);
    let command = Element::new(ElementClass::Line, name.as_str())
        .attr("phases", record.phases)
        .attr(
            "bus1",
            BusRef::with_suffix(mv_node(&record.start_node), &record.start_node_phase)?,
        )
        .attr(
            "bus2",
            BusRef::with_suffix(mv_node(&record.end_node), &record.end_node_phase)?,
        )
        .attr("length", record.length)
        .attr("units", record.units.as_str())
        .attr("linecode", linecode_name(&key))
        .into_new();
    Ok(Some(LineEmission {
        command,
        annotation: GeoAnnotation::named(name).with_ampacity(Some(code.effective_ampacity())),
    }))
}

/// Emit an LV line. Three-phase lines take every conductor of both buses,
/// anything else runs on conductor 1. Ampacity is recorded when the referenced
/// line code is known.
pub fn emit_lv_line(record: &LvLineRecord, codes: &LineCodeIndex<'_>) -> Result<LineEmission> {
    let conductors: &[u8] = if record.phases == 3 { &[1, 2, 3] } else { &[1] };
    let bus1 = BusRef::new(record.bus1.trim(), conductors)?;
    let bus2 = BusRef::new(record.bus2.trim(), conductors)?;
    let ampacity = codes
        .resolve(&record.linecode)
        .map(LineCodeRecord::effective_ampacity);
    if ampacity.is_none() {
        debug!(line = %record.line_name, linecode = %record.linecode, "no ampacity for lv line code");
    }
    let command = Element::new(ElementClass::Line, record.line_name.as_str())
        .attr("phases", record.phases)
        .attr("bus1", bus1)
        .attr("bus2", bus2)
        .attr("length", record.length)
        .attr("units", record.units.as_str())
        .attr("linecode", record.linecode.as_str())
        .into_new();
    Ok(LineEmission {
        command,
        annotation: GeoAnnotation::named(record.line_name.as_str()).with_ampacity(ampacity),
    })
}

/// Split `bus.1.2` into name and conductor list.
pub fn parse_named_bus(text: &str) -> Result<BusRef> {
    match text.trim().split_once('.') {
        Some((name, suffix)) => BusRef::with_suffix(name, suffix),
        None => BusRef::whole(text.trim()),
    }
}
