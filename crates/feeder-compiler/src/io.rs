//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Loaders for feeder tables and load-profile pools."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::{CompilerError, Result};
use crate::model::{IDENTIFIER_COLUMNS, PHASE_COLUMNS};
use crate::profiles::{ProfilePool, ProfilePools, POINTS_PER_DAY};
use crate::source::{FeederRecords, TableName};

/// Load a feeder from a directory of `<table>.csv` files or a single bundle.
pub fn load_feeder(path: impl AsRef<Path>) -> Result<FeederRecords> {
    let path = path.as_ref();
    if path.is_dir() {
        load_feeder_from_dir(path)
    } else {
        load_feeder_from_file(path)
    }
}

/// Every `<table>.csv` present in `dir` becomes a table; missing files leave
/// the table absent. The feeder is named after the directory.
pub fn load_feeder_from_dir(dir: impl AsRef<Path>) -> Result<FeederRecords> {
    let dir = dir.as_ref();
    let mut records = FeederRecords {
        name: dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        ..FeederRecords::default()
    };
    for table in TableName::ALL {
        let path = dir.join(format!("{}.csv", table.as_str()));
        if !path.is_file() {
            debug!(table = %table, "table file not present");
            continue;
        }
        match table {
            TableName::MvNetTxs => records.mv_net_txs = Some(read_table(&path)?),
            TableName::Linecodes => records.linecodes = Some(read_table(&path)?),
            TableName::Lines => records.lines = Some(read_table(&path)?),
            TableName::Mvcaps => records.mvcaps = Some(read_table(&path)?),
            TableName::Mvtx => records.mvtx = Some(read_table(&path)?),
            TableName::Lvtx => records.lvtx = Some(read_table(&path)?),
            TableName::LvLines => records.lv_lines = Some(read_table(&path)?),
            TableName::LvLoads => records.lv_loads = Some(read_table(&path)?),
        }
    }
    info!(
        feeder = records.name.as_deref().unwrap_or(""),
        tables = records.present_tables().len(),
        "feeder tables loaded"
    );
    Ok(records)
}

/// JSON or YAML bundle with one key per table.
pub fn load_feeder_from_file(path: impl AsRef<Path>) -> Result<FeederRecords> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let mut records: FeederRecords = if data.trim_start().starts_with('{') {
        let mut bundle: Value = serde_json::from_str(&data)?;
        stringify_identifiers(&mut bundle);
        serde_json::from_value(bundle)?
    } else {
        serde_yaml::from_str(&data).map_err(CompilerError::YamlSerializationFailed)?
    };
    if records.name.is_none() {
        records.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(records)
}

/// JSON numbers carry no original spelling, so identifier cells written as
/// numbers are turned into text before the typed rows are built. Integral
/// identifiers (`12.0`) collapse to `12`; phase suffixes keep `1.0`.
fn stringify_identifiers(bundle: &mut Value) {
    let Some(tables) = bundle.as_object_mut() else {
        return;
    };
    let rows = tables
        .values_mut()
        .filter_map(Value::as_array_mut)
        .flatten()
        .filter_map(Value::as_object_mut);
    for row in rows {
        for (column, cell) in row.iter_mut() {
            let Value::Number(number) = cell else {
                continue;
            };
            let text = if PHASE_COLUMNS.contains(&column.as_str()) {
                number.to_string()
            } else if IDENTIFIER_COLUMNS.contains(&column.as_str()) {
                match number.as_f64() {
                    Some(v) if number.is_f64() && v.is_finite() && v.fract() == 0.0 => {
                        format!("{}", v as i64)
                    }
                    _ => number.to_string(),
                }
            } else {
                continue;
            };
            *cell = Value::String(text);
        }
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    debug!(path = %path.display(), rows = rows.len(), "table read");
    Ok(rows)
}

/// Load one pool. `.csv` files use the long layout `profile,day,m1..m48`
/// (day 1-based); anything else is parsed as nested JSON arrays.
pub fn load_profile_pool(label: &'static str, path: impl AsRef<Path>) -> Result<ProfilePool> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let pool = if is_csv {
        ProfilePool::from_nested(label, read_profile_csv(path)?)?
    } else {
        let data = fs::read_to_string(path)?;
        let nested: Vec<Vec<Vec<f64>>> = serde_json::from_str(&data)?;
        ProfilePool::from_nested(label, nested)?
    };
    info!(
        pool = label,
        profiles = pool.profile_count(),
        days = pool.days(),
        "profile pool loaded"
    );
    Ok(pool)
}

pub fn load_profile_pools(
    residential: impl AsRef<Path>,
    commercial: impl AsRef<Path>,
) -> Result<ProfilePools> {
    Ok(ProfilePools::new(
        load_profile_pool("residential", residential)?,
        load_profile_pool("commercial", commercial)?,
    ))
}

fn read_profile_csv(path: &Path) -> Result<Vec<Vec<Vec<f64>>>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let mut grouped: BTreeMap<usize, BTreeMap<usize, Vec<f64>>> = BTreeMap::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let field = |position: usize| {
            row.get(position).ok_or_else(|| {
                CompilerError::MalformedProfile(format!(
                    "row {} has {} fields, expected {}",
                    line + 1,
                    row.len(),
                    POINTS_PER_DAY + 2
                ))
            })
        };
        let profile = parse_index(field(0)?, line)?;
        let day = parse_index(field(1)?, line)?;
        if day == 0 {
            return Err(CompilerError::MalformedProfile(format!(
                "row {}: days are numbered from 1",
                line + 1
            )));
        }
        let mut points = Vec::with_capacity(POINTS_PER_DAY);
        for position in 2..POINTS_PER_DAY + 2 {
            let text = field(position)?;
            let value = text.parse::<f64>().map_err(|_| {
                CompilerError::MalformedProfile(format!(
                    "row {}: '{}' is not a number",
                    line + 1,
                    text
                ))
            })?;
            points.push(value);
        }
        if grouped.entry(profile).or_default().insert(day, points).is_some() {
            return Err(CompilerError::MalformedProfile(format!(
                "row {}: profile {} day {} appears more than once",
                line + 1,
                profile,
                day
            )));
        }
    }

    let mut nested = Vec::with_capacity(grouped.len());
    for (expected_profile, (profile, days)) in grouped.into_iter().enumerate() {
        if profile != expected_profile {
            return Err(CompilerError::MalformedProfile(format!(
                "profile {} missing before profile {}",
                expected_profile, profile
            )));
        }
        let mut curves = Vec::with_capacity(days.len());
        for (expected_day, (day, points)) in days.into_iter().enumerate() {
            if day != expected_day + 1 {
                return Err(CompilerError::MalformedProfile(format!(
                    "profile {} skips day {}",
                    profile,
                    expected_day + 1
                )));
            }
            curves.push(points);
        }
        nested.push(curves);
    }
    Ok(nested)
}

fn parse_index(text: &str, line: usize) -> Result<usize> {
    text.parse::<usize>().map_err(|_| {
        CompilerError::MalformedProfile(format!(
            "row {}: '{}' is not a non-negative index",
            line + 1,
            text
        ))
    })
}
