//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Typed rows of the feeder engineering tables."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// Columns holding identifiers. They are read as raw text so `0012` and `12`
/// stay distinct nodes and `1.50` keeps its spelling.
pub(crate) const IDENTIFIER_COLUMNS: [&str; 9] = [
    "Substation_ID",
    "Bus1",
    "Bus2",
    "Linecode_ID",
    "Line_Number",
    "Start_Node",
    "End_Node",
    "Linecode",
    "Element_ID",
];

/// Dotted conductor suffix columns (`1.2.3`, `1.0`).
pub(crate) const PHASE_COLUMNS: [&str; 2] = ["Start_Node_Phase", "End_Node_Phase"];

struct RawText;

impl<'de> Visitor<'de> for RawText {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a textual identifier")
    }

    fn visit_none<E: de::Error>(self) -> Result<String, E> {
        Ok(String::new())
    }

    fn visit_unit<E: de::Error>(self) -> Result<String, E> {
        Ok(String::new())
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<String, D::Error> {
        d.deserialize_string(self)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.trim().to_owned())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v.trim().to_owned())
    }
}

/// CSV and YAML cells are taken verbatim instead of going through number
/// inference. JSON bundles have numeric identifiers turned into text by the
/// loader before they reach this point.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_option(RawText)
}

fn phase_suffix<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_string(RawText)
}

/// Spreadsheet exports spell booleans in several ways (`True`, `yes`, `1`).
fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolVisitor;

    impl<'de> Visitor<'de> for BoolVisitor {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean flag")
        }

        fn visit_none<E: de::Error>(self) -> Result<Option<bool>, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Option<bool>, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Option<bool>, D2::Error> {
            d.deserialize_any(self)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Option<bool>, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Option<bool>, E> {
            Ok(Some(v != 0))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Option<bool>, E> {
            Ok(Some(v != 0))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Option<bool>, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "yes" | "y" | "1" => Ok(Some(true)),
                "false" | "no" | "n" | "0" => Ok(Some(false)),
                other => Err(E::custom(format!("unrecognised boolean '{}'", other))),
            }
        }
    }

    deserializer.deserialize_option(BoolVisitor)
}

/// Winding connection of a transformer port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindingConnection {
    #[serde(alias = "delta", alias = "DELTA", alias = "D", alias = "d")]
    Delta,
    #[serde(alias = "wye", alias = "WYE", alias = "Y", alias = "y", alias = "Star")]
    Wye,
}

impl fmt::Display for WindingConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindingConnection::Delta => f.write_str("Delta"),
            WindingConnection::Wye => f.write_str("Wye"),
        }
    }
}

/// One row of `mv_net_txs`, `mvtx` or `lvtx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerRecord {
    #[serde(rename = "Substation_ID", deserialize_with = "id_string")]
    pub substation_id: String,
    #[serde(rename = "Bus1", deserialize_with = "id_string")]
    pub bus1: String,
    #[serde(rename = "Bus2", default, deserialize_with = "id_string")]
    pub bus2: String,
    #[serde(rename = "Connection_Primary", default)]
    pub connection_primary: Option<WindingConnection>,
    #[serde(rename = "Connection_Secondary", default)]
    pub connection_secondary: Option<WindingConnection>,
    /// Conductor letters (`RWB`, `RB`, `W`). Absent for whole-bus three-phase units.
    #[serde(rename = "Conn_Type", default)]
    pub conn_type: Option<String>,
    pub kvs_primary: f64,
    pub kvs_secondary: f64,
    pub kvas_primary: f64,
    pub kvas_secondary: f64,
    pub loadloss: f64,
    pub noloadloss: f64,
    pub xhl: f64,
    #[serde(default)]
    pub wdg1_tap: Option<f64>,
    #[serde(default)]
    pub wdg1_numtaps: Option<u32>,
    /// Customer class served (`RES` / `COM`), only present on LV substations.
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

impl TransformerRecord {
    /// Equal primary and secondary ratings mark an autotransformer regulator.
    pub fn is_autotransformer(&self) -> bool {
        self.kvs_primary == self.kvs_secondary
    }

    pub fn is_residential(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("RES"))
    }

    pub fn is_commercial(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("COM"))
    }

    /// Number of conductor letters, `None` when the record has no phase code.
    pub fn phase_code_len(&self) -> Option<usize> {
        self.conn_type
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(|code| code.chars().count())
    }
}

/// One row of `linecodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCodeRecord {
    #[serde(rename = "Linecode_ID", deserialize_with = "id_string")]
    pub linecode_id: String,
    #[serde(rename = "Phases")]
    pub phases: u8,
    pub r1: f64,
    pub x1: f64,
    pub b1: f64,
    pub r0: f64,
    pub x0: f64,
    pub b0: f64,
    #[serde(rename = "Units")]
    pub units: String,
    #[serde(rename = "Ampacity1")]
    pub ampacity1: f64,
    #[serde(rename = "Ampacity2")]
    pub ampacity2: f64,
}

impl LineCodeRecord {
    /// The lower of the two directional ratings.
    pub fn effective_ampacity(&self) -> f64 {
        self.ampacity1.min(self.ampacity2)
    }
}

/// One row of `lines` (medium-voltage conductors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord {
    #[serde(rename = "Line_Number", deserialize_with = "id_string")]
    pub line_number: String,
    #[serde(rename = "Element_Name", default)]
    pub element_name: String,
    #[serde(rename = "Start_Node", deserialize_with = "id_string")]
    pub start_node: String,
    #[serde(rename = "Start_Node_Phase", deserialize_with = "phase_suffix")]
    pub start_node_phase: String,
    #[serde(rename = "End_Node", deserialize_with = "id_string")]
    pub end_node: String,
    #[serde(rename = "End_Node_Phase", deserialize_with = "phase_suffix")]
    pub end_node_phase: String,
    #[serde(rename = "Phases")]
    pub phases: u8,
    #[serde(rename = "Length")]
    pub length: f64,
    #[serde(rename = "Units")]
    pub units: String,
    #[serde(rename = "Linecode", deserialize_with = "id_string")]
    pub linecode: String,
}

impl LineRecord {
    /// Rows kept in the source only to mark a removed span.
    pub fn is_deletion_marker(&self) -> bool {
        self.element_name.trim().eq_ignore_ascii_case("delete")
    }

    /// Identifier of the line-code row this line draws its parameters from.
    pub fn linecode_key(&self) -> String {
        format!("{}-{}ph", self.linecode, self.phases)
    }
}

/// One row of `lv_lines`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LvLineRecord {
    pub line_name: String,
    pub bus1: String,
    pub bus2: String,
    pub phases: u8,
    pub length: f64,
    pub units: String,
    pub linecode: String,
}

/// One row of `mvcaps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitorRecord {
    #[serde(rename = "Element_ID", deserialize_with = "id_string")]
    pub element_id: String,
    #[serde(rename = "Bus1", deserialize_with = "id_string")]
    pub bus1: String,
    pub phases: u8,
    pub kvar: f64,
    pub kvs: f64,
}

/// Engine load status: how the load follows daily multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    #[default]
    #[serde(alias = "Variable", alias = "VARIABLE")]
    Variable,
    #[serde(alias = "Fixed", alias = "FIXED")]
    Fixed,
    #[serde(alias = "Exempt", alias = "EXEMPT")]
    Exempt,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Variable => f.write_str("variable"),
            LoadStatus::Fixed => f.write_str("fixed"),
            LoadStatus::Exempt => f.write_str("exempt"),
        }
    }
}

/// One row of `lv_loads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRecord {
    pub load_name: String,
    pub bus1: String,
    pub phases: u8,
    pub kv: f64,
    pub pf: f64,
    #[serde(rename = "model", default)]
    pub status: LoadStatus,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub enabled: Option<bool>,
    /// Capacity of the serving transformer, required for non-residential loads.
    #[serde(default)]
    pub tx_cap: Option<f64>,
}

impl LoadRecord {
    pub fn is_residential(&self) -> bool {
        self.phases == 1
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifiers_keep_their_spelling() {
        let line: LineRecord = serde_json::from_value(json!({
            "Line_Number": "007",
            "Element_Name": "span",
            "Start_Node": "0012",
            "Start_Node_Phase": "1.2.3",
            "End_Node": " 12 ",
            "End_Node_Phase": "1.0",
            "Phases": 3,
            "Length": 0.42,
            "Units": "km",
            "Linecode": "1.50"
        }))
        .unwrap();
        assert_eq!(line.line_number, "007");
        assert_eq!(line.start_node, "0012");
        assert_eq!(line.end_node, "12");
        assert_eq!(line.end_node_phase, "1.0");
        assert_eq!(line.linecode_key(), "1.50-3ph");
    }

    #[test]
    fn null_secondary_bus_is_empty() {
        let tx: TransformerRecord = serde_json::from_value(json!({
            "Substation_ID": "S1", "Bus1": "2", "Bus2": null,
            "kvs_primary": 22, "kvs_secondary": 0.433, "kvas_primary": 315,
            "kvas_secondary": 315, "loadloss": 1.1, "noloadloss": 0.15, "xhl": 4
        }))
        .unwrap();
        assert_eq!(tx.bus2, "");
    }

    #[test]
    fn deletion_marker_is_case_insensitive() {
        let mut line: LineRecord = serde_json::from_value(json!({
            "Line_Number": "1", "Element_Name": "DeLeTe", "Start_Node": "1",
            "Start_Node_Phase": "1", "End_Node": "2", "End_Node_Phase": "1",
            "Phases": 1, "Length": 1.0, "Units": "km", "Linecode": "x"
        }))
        .unwrap();
        assert!(line.is_deletion_marker());
        line.element_name = "feeder".into();
        assert!(!line.is_deletion_marker());
    }

    #[test]
    fn effective_ampacity_is_minimum() {
        let code = LineCodeRecord {
            linecode_id: "a-3ph".into(),
            phases: 3,
            r1: 0.1,
            x1: 0.2,
            b1: 0.0,
            r0: 0.3,
            x0: 0.4,
            b0: 0.0,
            units: "km".into(),
            ampacity1: 310.0,
            ampacity2: 275.0,
        };
        assert_eq!(code.effective_ampacity(), 275.0);
    }

    #[test]
    fn load_flags_accept_spreadsheet_spellings() {
        let load: LoadRecord = serde_json::from_value(json!({
            "load_name": "c1", "bus1": "lv1.1", "phases": 1, "kv": 0.23,
            "pf": 0.95, "model": "Fixed", "enabled": "False"
        }))
        .unwrap();
        assert_eq!(load.status, LoadStatus::Fixed);
        assert!(!load.is_enabled());
        assert!(load.is_residential());
    }

    #[test]
    fn connection_aliases_parse() {
        let conn: WindingConnection = serde_json::from_value(json!("delta")).unwrap();
        assert_eq!(conn, WindingConnection::Delta);
        let conn: WindingConnection = serde_json::from_value(json!("Y")).unwrap();
        assert_eq!(conn.to_string(), "Wye");
    }
}
