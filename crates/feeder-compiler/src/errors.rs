//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Error taxonomy of the topology compiler."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use thiserror::Error;

use crate::stages::Stage;

pub type Result<T> = std::result::Result<T, CompilerError>;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("required table '{0}' is missing from the record source")]
    MissingTable(&'static str),
    #[error("invalid phase code '{code}': {reason}")]
    InvalidPhaseCode { code: String, reason: &'static str },
    #[error("transformer {record} has unsupported phase code length {length}")]
    UnsupportedTopology { record: String, length: usize },
    #[error(
        "load {load}: no commercial profile with peak below {limit} after {attempts} draws"
    )]
    ProfileSamplingExhausted {
        load: String,
        limit: f64,
        attempts: u32,
    },
    #[error("line {line} references unknown line code '{linecode}'")]
    UnknownLineCode { line: String, linecode: String },
    #[error("{table} record {record} is missing attribute '{attribute}'")]
    MissingAttribute {
        table: &'static str,
        record: String,
        attribute: &'static str,
    },
    #[error("invalid bus reference '{bus}': {reason}")]
    InvalidBusReference { bus: String, reason: String },
    #[error("day of year {0} is outside 1..=365")]
    InvalidDay(u16),
    #[error("{pool} profile pool covers {available} days, day {requested} requested")]
    DayOutOfRange {
        pool: &'static str,
        available: usize,
        requested: u16,
    },
    #[error("{0} profile pool is empty")]
    EmptyProfilePool(&'static str),
    #[error("malformed profile data: {0}")]
    MalformedProfile(String),
    #[error("stage {attempted} cannot run after stage {completed}")]
    StageOrder { attempted: Stage, completed: Stage },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
}
