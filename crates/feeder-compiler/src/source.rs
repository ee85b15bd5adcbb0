//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Record source abstraction over the named feeder tables."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CompilerError, Result};
use crate::model::{
    CapacitorRecord, LineCodeRecord, LineRecord, LoadRecord, LvLineRecord, TransformerRecord,
};

/// The engineering tables a feeder is described by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    MvNetTxs,
    Linecodes,
    Lines,
    Mvcaps,
    Mvtx,
    Lvtx,
    LvLines,
    LvLoads,
}

impl TableName {
    pub const ALL: [TableName; 8] = [
        TableName::MvNetTxs,
        TableName::Linecodes,
        TableName::Lines,
        TableName::Mvcaps,
        TableName::Mvtx,
        TableName::Lvtx,
        TableName::LvLines,
        TableName::LvLoads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::MvNetTxs => "mv_net_txs",
            TableName::Linecodes => "linecodes",
            TableName::Lines => "lines",
            TableName::Mvcaps => "mvcaps",
            TableName::Mvtx => "mvtx",
            TableName::Lvtx => "lvtx",
            TableName::LvLines => "lv_lines",
            TableName::LvLoads => "lv_loads",
        }
    }

    /// Capacitor banks and in-line MV transformers may be absent from a feeder.
    pub fn is_optional(&self) -> bool {
        matches!(self, TableName::Mvcaps | TableName::Mvtx)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only access to the feeder tables, each of which may be absent.
pub trait RecordSource {
    fn feeder_name(&self) -> &str;

    /// Rows of one of the transformer tables (`mv_net_txs`, `mvtx`, `lvtx`).
    fn transformers(&self, table: TableName) -> Option<&[TransformerRecord]>;

    fn line_codes(&self) -> Option<&[LineCodeRecord]>;

    fn mv_lines(&self) -> Option<&[LineRecord]>;

    fn capacitors(&self) -> Option<&[CapacitorRecord]>;

    fn lv_lines(&self) -> Option<&[LvLineRecord]>;

    fn loads(&self) -> Option<&[LoadRecord]>;

    fn has_table(&self, table: TableName) -> bool {
        match table {
            TableName::MvNetTxs | TableName::Mvtx | TableName::Lvtx => {
                self.transformers(table).is_some()
            }
            TableName::Linecodes => self.line_codes().is_some(),
            TableName::Lines => self.mv_lines().is_some(),
            TableName::Mvcaps => self.capacitors().is_some(),
            TableName::LvLines => self.lv_lines().is_some(),
            TableName::LvLoads => self.loads().is_some(),
        }
    }
}

/// Unwrap a table the compile cannot proceed without.
pub fn require<T>(rows: Option<&[T]>, table: TableName) -> Result<&[T]> {
    rows.ok_or(CompilerError::MissingTable(table.as_str()))
}

/// In-memory feeder bundle, as loaded from a directory of CSV files or a
/// single JSON/YAML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeederRecords {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mv_net_txs: Option<Vec<TransformerRecord>>,
    #[serde(default)]
    pub linecodes: Option<Vec<LineCodeRecord>>,
    #[serde(default)]
    pub lines: Option<Vec<LineRecord>>,
    #[serde(default)]
    pub mvcaps: Option<Vec<CapacitorRecord>>,
    #[serde(default)]
    pub mvtx: Option<Vec<TransformerRecord>>,
    #[serde(default)]
    pub lvtx: Option<Vec<TransformerRecord>>,
    #[serde(default)]
    pub lv_lines: Option<Vec<LvLineRecord>>,
    #[serde(default)]
    pub lv_loads: Option<Vec<LoadRecord>>,
}

impl FeederRecords {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn present_tables(&self) -> Vec<TableName> {
        TableName::ALL
            .into_iter()
            .filter(|table| self.has_table(*table))
            .collect()
    }
}

impl RecordSource for FeederRecords {
    fn feeder_name(&self) -> &str {
        self.name.as_deref().unwrap_or("feeder")
    }

    fn transformers(&self, table: TableName) -> Option<&[TransformerRecord]> {
        match table {
            TableName::MvNetTxs => self.mv_net_txs.as_deref(),
            TableName::Mvtx => self.mvtx.as_deref(),
            TableName::Lvtx => self.lvtx.as_deref(),
            _ => None,
        }
    }

    fn line_codes(&self) -> Option<&[LineCodeRecord]> {
        self.linecodes.as_deref()
    }

    fn mv_lines(&self) -> Option<&[LineRecord]> {
        self.lines.as_deref()
    }

    fn capacitors(&self) -> Option<&[CapacitorRecord]> {
        self.mvcaps.as_deref()
    }

    fn lv_lines(&self) -> Option<&[LvLineRecord]> {
        self.lv_lines.as_deref()
    }

    fn loads(&self) -> Option<&[LoadRecord]> {
        self.lv_loads.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_reports_no_tables() {
        let records = FeederRecords::default();
        assert!(records.present_tables().is_empty());
        assert_eq!(records.feeder_name(), "feeder");
        let err = require(records.mv_lines(), TableName::Lines).unwrap_err();
        assert!(matches!(err, CompilerError::MissingTable("lines")));
    }

    #[test]
    fn empty_table_is_still_present() {
        let records = FeederRecords {
            mvcaps: Some(Vec::new()),
            ..FeederRecords::default()
        }
        .with_name("rural-1");
        assert!(records.has_table(TableName::Mvcaps));
        assert!(!records.has_table(TableName::Mvtx));
        assert_eq!(records.feeder_name(), "rural-1");
    }

    #[test]
    fn only_capacitors_and_mv_transformers_are_optional() {
        let optional: Vec<_> = TableName::ALL
            .into_iter()
            .filter(TableName::is_optional)
            .collect();
        assert_eq!(optional, vec![TableName::Mvcaps, TableName::Mvtx]);
    }
}
