//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Conductor letter codes and engine bus/phase references."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
//! Conductor naming in the source records uses the letters R, W and B for the
//! three phases. The engine addresses conductors positionally (`bus.1.3`), so
//! every record phase code is translated through a fixed permutation table.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::errors::{CompilerError, Result};

const CONDUCTORS: [(char, u8); 3] = [('R', 1), ('W', 2), ('B', 3)];

/// Every ordered selection of one to three distinct conductors, keyed by its
/// letter code and mapped to the engine's dotted suffix.
static PHASE_TABLE: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for length in 1..=CONDUCTORS.len() {
        let mut current = Vec::with_capacity(length);
        collect_permutations(length, &mut current, &mut table);
    }
    table
});

fn collect_permutations(
    length: usize,
    current: &mut Vec<(char, u8)>,
    table: &mut HashMap<String, String>,
) {
    if current.len() == length {
        let code: String = current.iter().map(|(letter, _)| *letter).collect();
        let suffix = current
            .iter()
            .map(|(_, index)| index.to_string())
            .collect::<Vec<_>>()
            .join(".");
        table.insert(code, suffix);
        return;
    }
    for conductor in CONDUCTORS {
        if current.contains(&conductor) {
            continue;
        }
        current.push(conductor);
        collect_permutations(length, current, table);
        current.pop();
    }
}

/// Number of entries in the translation table (15 for a three-letter alphabet).
pub fn table_len() -> usize {
    PHASE_TABLE.len()
}

/// Translate a letter code such as `"RB"` into the engine suffix `"1.3"`.
pub fn translate(code: &str) -> Result<&'static str> {
    let length = code.chars().count();
    if length == 0 || length > CONDUCTORS.len() {
        return Err(CompilerError::InvalidPhaseCode {
            code: code.to_owned(),
            reason: "length must be between 1 and 3",
        });
    }
    if code
        .chars()
        .any(|c| !CONDUCTORS.iter().any(|(letter, _)| *letter == c))
    {
        return Err(CompilerError::InvalidPhaseCode {
            code: code.to_owned(),
            reason: "letters must be drawn from R, W and B",
        });
    }
    let table: &'static HashMap<String, String> = &PHASE_TABLE;
    table
        .get(code)
        .map(String::as_str)
        .ok_or_else(|| CompilerError::InvalidPhaseCode {
            code: code.to_owned(),
            reason: "letters must not repeat",
        })
}

/// A validated conductor letter code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhaseCode {
    letters: String,
    suffix: &'static str,
}

impl PhaseCode {
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim().to_ascii_uppercase();
        let suffix = translate(&trimmed)?;
        Ok(Self {
            letters: trimmed,
            suffix,
        })
    }

    /// Recover the letter code from an engine suffix such as `"2.1"`.
    pub fn from_suffix(suffix: &str) -> Result<Self> {
        let mut letters = String::new();
        for part in suffix.split('.') {
            let letter = CONDUCTORS
                .iter()
                .find(|(_, index)| part.parse::<u8>().ok() == Some(*index))
                .map(|(letter, _)| *letter)
                .ok_or_else(|| CompilerError::InvalidPhaseCode {
                    code: suffix.to_owned(),
                    reason: "suffix positions must be 1, 2 or 3",
                })?;
            letters.push(letter);
        }
        Self::parse(&letters)
    }

    pub fn letters(&self) -> &str {
        &self.letters
    }

    pub fn suffix(&self) -> &'static str {
        self.suffix
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Positional phase indices in record order.
    pub fn indices(&self) -> Vec<u8> {
        self.suffix
            .split('.')
            .filter_map(|part| part.parse().ok())
            .collect()
    }
}

impl fmt::Display for PhaseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters)
    }
}

/// Engine bus name plus the ordered conductors it is connected through.
///
/// An empty phase list renders as the bare bus name, which the engine treats
/// as "all conductors in default order".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusRef {
    name: String,
    phases: Vec<u8>,
}

impl BusRef {
    pub fn new(name: impl Into<String>, phases: &[u8]) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() || name.contains(char::is_whitespace) {
            return Err(CompilerError::InvalidBusReference {
                bus: name,
                reason: "bus names must be non-empty and free of whitespace".into(),
            });
        }
        for (position, phase) in phases.iter().enumerate() {
            if *phase > 3 {
                return Err(CompilerError::InvalidBusReference {
                    bus: name,
                    reason: format!("phase index {} outside 0..=3", phase),
                });
            }
            if phases[..position].contains(phase) {
                return Err(CompilerError::InvalidBusReference {
                    bus: name,
                    reason: format!("phase index {} repeated", phase),
                });
            }
        }
        Ok(Self {
            name,
            phases: phases.to_vec(),
        })
    }

    /// Bus without an explicit conductor list.
    pub fn whole(name: impl Into<String>) -> Result<Self> {
        Self::new(name, &[])
    }

    /// Parse a dotted suffix such as `"1.2.3"` coming straight from a record.
    pub fn with_suffix(name: impl Into<String>, suffix: &str) -> Result<Self> {
        let name = name.into();
        let suffix = suffix.trim();
        if suffix.is_empty() {
            return Self::whole(name);
        }
        let mut phases = Vec::new();
        for part in suffix.split('.') {
            match part.trim().parse::<u8>() {
                Ok(phase) => phases.push(phase),
                Err(_) => {
                    return Err(CompilerError::InvalidBusReference {
                        bus: format!("{}.{}", name, suffix),
                        reason: format!("'{}' is not a phase index", part),
                    })
                }
            }
        }
        Self::new(name, &phases)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phases(&self) -> &[u8] {
        &self.phases
    }
}

impl fmt::Display for BusRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for phase in &self.phases {
            write!(f, ".{}", phase)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_codes() -> Vec<String> {
        let letters = ['R', 'W', 'B'];
        let mut codes = Vec::new();
        for a in letters {
            codes.push(a.to_string());
            for b in letters.iter().filter(|b| **b != a) {
                codes.push(format!("{a}{b}"));
                for c in letters.iter().filter(|c| **c != a && *c != b) {
                    codes.push(format!("{a}{b}{c}"));
                }
            }
        }
        codes
    }

    #[test]
    fn table_holds_every_permutation() {
        assert_eq!(table_len(), 15);
        assert_eq!(all_codes().len(), 15);
    }

    #[test]
    fn translates_known_codes() {
        assert_eq!(translate("RB").unwrap(), "1.3");
        assert_eq!(translate("BWR").unwrap(), "3.2.1");
        assert_eq!(translate("W").unwrap(), "2");
    }

    #[test]
    fn suffix_round_trips_to_letters() {
        for code in all_codes() {
            let parsed = PhaseCode::parse(&code).unwrap();
            let back = PhaseCode::from_suffix(parsed.suffix()).unwrap();
            assert_eq!(back.letters(), code);
            assert_eq!(parsed.indices().len(), code.len());
        }
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "RWBR", "RX", "RR", "G"] {
            assert!(
                matches!(
                    translate(bad),
                    Err(CompilerError::InvalidPhaseCode { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_normalises_case_and_whitespace() {
        let code = PhaseCode::parse(" rw ").unwrap();
        assert_eq!(code.letters(), "RW");
        assert_eq!(code.suffix(), "1.2");
    }

    #[test]
    fn bus_ref_renders_phases() {
        let bus = BusRef::new("mv_f0_n12", &[1, 0]).unwrap();
        assert_eq!(bus.to_string(), "mv_f0_n12.1.0");
        assert_eq!(BusRef::whole("sourcebus").unwrap().to_string(), "sourcebus");
        assert_eq!(
            BusRef::with_suffix("mv_f0_n3", "1.2.3").unwrap().phases(),
            &[1, 2, 3]
        );
    }

    #[test]
    fn bus_ref_rejects_repeats_and_unknown_phases() {
        assert!(BusRef::new("b", &[1, 1]).is_err());
        assert!(BusRef::new("b", &[4]).is_err());
        assert!(BusRef::with_suffix("b", "1.x").is_err());
        assert!(BusRef::whole("has space").is_err());
    }
}
