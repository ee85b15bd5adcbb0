//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Capacitor bank and customer load emission."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use crate::engine::{DssCommand, Element, ElementClass};
use crate::errors::Result;
use crate::lines::parse_named_bus;
use crate::model::{CapacitorRecord, LoadRecord};
use crate::phase::BusRef;
use crate::transformer::mv_node;

pub fn capacitor_name(record: &CapacitorRecord) -> String {
    format!("mv_f0_c{}", record.element_id)
}

/// Capacitor banks always connect across all three conductors of their node.
pub fn emit_capacitor(record: &CapacitorRecord) -> Result<DssCommand> {
    Ok(
        Element::new(ElementClass::Capacitor, capacitor_name(record))
            .attr("phases", record.phases)
            .attr("bus1", BusRef::new(mv_node(&record.bus1), &[1, 2, 3])?)
            .attr("kvar", record.kvar)
            .attr("kv", record.kvs)
            .into_new(),
    )
}

/// Loads are created at 1 kW and scaled by their daily shape.
pub fn emit_load(record: &LoadRecord) -> Result<DssCommand> {
    Ok(
        Element::new(ElementClass::Load, record.load_name.as_str())
            .attr("phases", record.phases)
            .attr("bus1", parse_named_bus(&record.bus1)?)
            .attr("kw", 1u8)
            .attr("conn", "wye")
            .attr("kv", record.kv)
            .attr("pf", record.pf)
            .attr("model", 1u8)
            .attr("vminpu", 0.0)
            .attr("vmaxpu", 2u8)
            .attr("status", record.status.to_string())
            .attr("enabled", record.is_enabled())
            .into_new(),
    )
}
