//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Compile stages and the cursor enforcing their order."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CompilerError, Result};
use crate::source::TableName;

/// Stages of a compile, in the only order the engine accepts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Source,
    MvTransformers,
    LineCodes,
    MvLines,
    Capacitors,
    Regulators,
    LvTransformers,
    LvLines,
    Loads,
    Directives,
}

impl Stage {
    pub const ORDER: [Stage; 11] = [
        Stage::Setup,
        Stage::Source,
        Stage::MvTransformers,
        Stage::LineCodes,
        Stage::MvLines,
        Stage::Capacitors,
        Stage::Regulators,
        Stage::LvTransformers,
        Stage::LvLines,
        Stage::Loads,
        Stage::Directives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Source => "source",
            Stage::MvTransformers => "mv_transformers",
            Stage::LineCodes => "line_codes",
            Stage::MvLines => "mv_lines",
            Stage::Capacitors => "capacitors",
            Stage::Regulators => "regulators",
            Stage::LvTransformers => "lv_transformers",
            Stage::LvLines => "lv_lines",
            Stage::Loads => "loads",
            Stage::Directives => "directives",
        }
    }

    /// Table the stage reads, if any.
    pub fn table(&self) -> Option<TableName> {
        match self {
            Stage::Setup | Stage::Source | Stage::Directives => None,
            Stage::MvTransformers => Some(TableName::MvNetTxs),
            Stage::LineCodes => Some(TableName::Linecodes),
            Stage::MvLines => Some(TableName::Lines),
            Stage::Capacitors => Some(TableName::Mvcaps),
            Stage::Regulators => Some(TableName::Mvtx),
            Stage::LvTransformers => Some(TableName::Lvtx),
            Stage::LvLines => Some(TableName::LvLines),
            Stage::Loads => Some(TableName::LvLoads),
        }
    }

    /// Optional stages skip bad records instead of aborting the compile.
    pub fn is_optional(&self) -> bool {
        self.table().is_some_and(|table| table.is_optional())
    }

    fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the last stage entered and refuses to move backwards or repeat.
#[derive(Debug, Clone, Default)]
pub struct StageCursor {
    current: Option<Stage>,
}

impl StageCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, stage: Stage) -> Result<()> {
        if let Some(current) = self.current {
            if stage.position() <= current.position() {
                return Err(CompilerError::StageOrder {
                    attempted: stage,
                    completed: current,
                });
            }
        }
        self.current = Some(stage);
        Ok(())
    }
}
