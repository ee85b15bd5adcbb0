//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Daily load-profile pools, session day and profile sampling."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
//! Profiles are opaque pre-recorded half-hourly curves arranged as
//! `[profile][day][48]`. Every load is bound to one curve for the session day.

use std::fmt;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{DssCommand, Element, ElementClass};
use crate::errors::{CompilerError, Result};
use crate::model::LoadRecord;

pub const POINTS_PER_DAY: usize = 48;
pub const INTERVAL_MINUTES: u32 = 30;
pub const DAYS_PER_YEAR: u16 = 365;

/// Non-leap year used to turn a day-of-year into a calendar date.
const REFERENCE_YEAR: i32 = 2021;

/// Southern-hemisphere season of a day-of-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Spring,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
            Season::Spring => "Spring",
        };
        f.write_str(label)
    }
}

/// Day of the year, 1..=365.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct DayOfYear(u16);

impl DayOfYear {
    pub fn new(day: u16) -> Result<Self> {
        if (1..=DAYS_PER_YEAR).contains(&day) {
            Ok(Self(day))
        } else {
            Err(CompilerError::InvalidDay(day))
        }
    }

    /// Uniform draw over the whole year.
    pub fn draw(rng: &mut StdRng) -> Self {
        Self(rng.gen_range(0..DAYS_PER_YEAR) + 1)
    }

    pub fn ordinal(self) -> u16 {
        self.0
    }

    /// Zero-based position in a pool's day axis.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    pub fn date(self) -> NaiveDate {
        // Every ordinal in 1..=365 exists in the reference year.
        NaiveDate::from_yo_opt(REFERENCE_YEAR, u32::from(self.0)).unwrap_or_default()
    }

    /// Calendar label such as `"19 July"`.
    pub fn date_label(self) -> String {
        self.date().format("%-d %B").to_string()
    }

    pub fn season(self) -> Season {
        match self.0 {
            day if day >= 355 || day <= 78 => Season::Summer,
            79..=170 => Season::Autumn,
            171..=263 => Season::Winter,
            _ => Season::Spring,
        }
    }
}

impl TryFrom<u16> for DayOfYear {
    type Error = CompilerError;

    fn try_from(day: u16) -> Result<Self> {
        Self::new(day)
    }
}

impl From<DayOfYear> for u16 {
    fn from(day: DayOfYear) -> u16 {
        day.0
    }
}

impl fmt::Display for DayOfYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One day of half-hourly demand multipliers.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    points: Vec<f64>,
}

impl LoadProfile {
    pub fn new(points: Vec<f64>) -> Result<Self> {
        if points.len() != POINTS_PER_DAY {
            return Err(CompilerError::MalformedProfile(format!(
                "expected {} points, found {}",
                POINTS_PER_DAY,
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|value| !value.is_finite()) {
            return Err(CompilerError::MalformedProfile(format!(
                "non-finite multiplier {}",
                bad
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn peak(&self) -> f64 {
        self.points.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Customer class, which also selects the pool a load draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerClass {
    Residential,
    Commercial,
}

impl CustomerClass {
    pub fn of(load: &LoadRecord) -> Self {
        if load.is_residential() {
            CustomerClass::Residential
        } else {
            CustomerClass::Commercial
        }
    }

    pub fn shape_prefix(&self) -> &'static str {
        match self {
            CustomerClass::Residential => "res",
            CustomerClass::Commercial => "com",
        }
    }

    pub fn pool_label(&self) -> &'static str {
        match self {
            CustomerClass::Residential => "residential",
            CustomerClass::Commercial => "commercial",
        }
    }
}

/// Profiles of one customer class, indexed `[profile][day]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePool {
    label: &'static str,
    profiles: Vec<Vec<LoadProfile>>,
}

impl ProfilePool {
    pub fn empty(label: &'static str) -> Self {
        Self {
            label,
            profiles: Vec::new(),
        }
    }

    /// Build from nested arrays. Every profile must cover the same days.
    pub fn from_nested(label: &'static str, nested: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        let mut profiles = Vec::with_capacity(nested.len());
        let mut expected_days = None;
        for (profile_index, days) in nested.into_iter().enumerate() {
            match expected_days {
                None => expected_days = Some(days.len()),
                Some(expected) if expected != days.len() => {
                    return Err(CompilerError::MalformedProfile(format!(
                        "{} profile {} covers {} days, expected {}",
                        label,
                        profile_index,
                        days.len(),
                        expected
                    )))
                }
                Some(_) => {}
            }
            let curves = days
                .into_iter()
                .map(LoadProfile::new)
                .collect::<Result<Vec<_>>>()
                .map_err(|err| {
                    CompilerError::MalformedProfile(format!(
                        "{} profile {}: {}",
                        label, profile_index, err
                    ))
                })?;
            profiles.push(curves);
        }
        Ok(Self { label, profiles })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn days(&self) -> usize {
        self.profiles.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Fail unless `day` can be served from this pool.
    pub fn ensure_day(&self, day: DayOfYear) -> Result<()> {
        if self.is_empty() {
            return Err(CompilerError::EmptyProfilePool(self.label));
        }
        if day.index() >= self.days() {
            return Err(CompilerError::DayOutOfRange {
                pool: self.label,
                available: self.days(),
                requested: day.ordinal(),
            });
        }
        Ok(())
    }

    pub fn curve(&self, profile: usize, day: DayOfYear) -> Option<&LoadProfile> {
        self.profiles
            .get(profile)
            .and_then(|days| days.get(day.index()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePools {
    pub residential: ProfilePool,
    pub commercial: ProfilePool,
}

impl ProfilePools {
    pub fn new(residential: ProfilePool, commercial: ProfilePool) -> Self {
        Self {
            residential,
            commercial,
        }
    }

    pub fn pool(&self, class: CustomerClass) -> &ProfilePool {
        match class {
            CustomerClass::Residential => &self.residential,
            CustomerClass::Commercial => &self.commercial,
        }
    }
}

/// A curve bound to one load.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundProfile {
    pub class: CustomerClass,
    /// Index of the load record, used to name the shape.
    pub record: usize,
    pub profile_index: usize,
    pub draws: u32,
    pub profile: LoadProfile,
}

impl BoundProfile {
    pub fn shape_name(&self) -> String {
        format!("Load_shape_{}_{}", self.class.shape_prefix(), self.record)
    }

    /// Loadshape definition followed by the edit pointing the load at it.
    pub fn commands(&self, load_name: &str) -> Vec<DssCommand> {
        let shape = self.shape_name();
        vec![
            Element::new(ElementClass::Loadshape, shape.as_str())
                .attr("npts", POINTS_PER_DAY)
                .attr("minterval", INTERVAL_MINUTES)
                .attr("Pmult", self.profile.points().to_vec())
                .attr("useactual", "no")
                .into_new(),
            Element::new(ElementClass::Load, load_name)
                .attr("daily", shape)
                .into_edit(),
        ]
    }
}

/// Draws curves for loads from a session-wide seeded source.
pub struct ProfileSampler<'a> {
    pools: &'a ProfilePools,
    rng: StdRng,
    day: DayOfYear,
    max_draws: u32,
}

impl<'a> ProfileSampler<'a> {
    /// Seed the session source. Without an explicit day one is drawn first.
    pub fn new(
        pools: &'a ProfilePools,
        seed: u64,
        day: Option<DayOfYear>,
        max_draws: u32,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let day = day.unwrap_or_else(|| DayOfYear::draw(&mut rng));
        Self {
            pools,
            rng,
            day,
            max_draws: max_draws.max(1),
        }
    }

    pub fn day(&self) -> DayOfYear {
        self.day
    }

    /// Bind a curve to `load`. Residential loads take the first draw;
    /// commercial loads redraw until the peak stays under half the serving
    /// transformer's capacity.
    pub fn sample(&mut self, record: usize, load: &LoadRecord) -> Result<BoundProfile> {
        let class = CustomerClass::of(load);
        let pool = self.pools.pool(class);
        pool.ensure_day(self.day)?;

        let limit = match class {
            CustomerClass::Residential => None,
            CustomerClass::Commercial => {
                let capacity = load.tx_cap.ok_or_else(|| CompilerError::MissingAttribute {
                    table: "lv_loads",
                    record: load.load_name.clone(),
                    attribute: "tx_cap",
                })?;
                Some(capacity / 2.0)
            }
        };

        for draws in 1..=self.max_draws {
            let profile_index = self.rng.gen_range(0..pool.profile_count());
            let curve = pool.curve(profile_index, self.day).ok_or_else(|| {
                CompilerError::MalformedProfile(format!(
                    "{} profile {} has no day {}",
                    pool.label(),
                    profile_index,
                    self.day
                ))
            })?;
            let feasible = limit.map_or(true, |limit| curve.peak() < limit);
            if feasible {
                debug!(
                    load = %load.load_name,
                    class = pool.label(),
                    profile_index,
                    draws,
                    "profile bound"
                );
                return Ok(BoundProfile {
                    class,
                    record,
                    profile_index,
                    draws,
                    profile: curve.clone(),
                });
            }
        }

        Err(CompilerError::ProfileSamplingExhausted {
            load: load.load_name.clone(),
            limit: limit.unwrap_or(f64::INFINITY),
            attempts: self.max_draws,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoadStatus;

    fn flat(level: f64) -> Vec<f64> {
        vec![level; POINTS_PER_DAY]
    }

    fn pool(label: &'static str, peaks: &[f64], days: usize) -> ProfilePool {
        let nested = peaks
            .iter()
            .map(|peak| (0..days).map(|_| flat(*peak)).collect())
            .collect();
        ProfilePool::from_nested(label, nested).unwrap()
    }

    fn load(phases: u8, tx_cap: Option<f64>) -> LoadRecord {
        LoadRecord {
            load_name: "c1".into(),
            bus1: "lv1_b1.1".into(),
            phases,
            kv: 0.4,
            pf: 0.95,
            status: LoadStatus::Variable,
            enabled: None,
            tx_cap,
        }
    }

    #[test]
    fn season_boundaries() {
        let season = |day| DayOfYear::new(day).unwrap().season();
        assert_eq!(season(1), Season::Summer);
        assert_eq!(season(78), Season::Summer);
        assert_eq!(season(79), Season::Autumn);
        assert_eq!(season(170), Season::Autumn);
        assert_eq!(season(171), Season::Winter);
        assert_eq!(season(263), Season::Winter);
        assert_eq!(season(264), Season::Spring);
        assert_eq!(season(354), Season::Spring);
        assert_eq!(season(355), Season::Summer);
    }

    #[test]
    fn day_labels_use_reference_year() {
        assert_eq!(DayOfYear::new(1).unwrap().date_label(), "1 January");
        assert_eq!(DayOfYear::new(200).unwrap().date_label(), "19 July");
        assert_eq!(DayOfYear::new(365).unwrap().index(), 364);
        assert!(matches!(DayOfYear::new(0), Err(CompilerError::InvalidDay(0))));
        assert!(DayOfYear::new(366).is_err());
    }

    #[test]
    fn rejects_short_curves_and_ragged_pools() {
        assert!(LoadProfile::new(vec![1.0; 47]).is_err());
        let ragged = vec![vec![flat(1.0)], vec![flat(1.0), flat(1.0)]];
        assert!(matches!(
            ProfilePool::from_nested("residential", ragged),
            Err(CompilerError::MalformedProfile(_))
        ));
    }

    #[test]
    fn residential_binds_on_first_draw() {
        let pools = ProfilePools::new(pool("residential", &[9.0, 7.0], 3), pool("commercial", &[], 0));
        let mut sampler = ProfileSampler::new(&pools, 100, Some(DayOfYear::new(2).unwrap()), 500);
        let bound = sampler.sample(4, &load(1, None)).unwrap();
        assert_eq!(bound.draws, 1);
        assert_eq!(bound.shape_name(), "Load_shape_res_4");
        let commands = bound.commands("c1");
        assert!(commands[0]
            .to_string()
            .starts_with("new loadshape.Load_shape_res_4 npts=48 minterval=30 Pmult=["));
        assert_eq!(commands[1].to_string(), "edit load.c1 daily=Load_shape_res_4");
    }

    #[test]
    fn commercial_peak_stays_below_half_capacity() {
        let pools = ProfilePools::new(
            pool("residential", &[1.0], 1),
            pool("commercial", &[9.0, 4.9, 6.0, 5.0, 12.0], 1),
        );
        let day = Some(DayOfYear::new(1).unwrap());
        for seed in 0..50 {
            let mut sampler = ProfileSampler::new(&pools, seed, day, 500);
            let bound = sampler.sample(0, &load(3, Some(10.0))).unwrap();
            assert!(bound.profile.peak() < 5.0);
            assert_eq!(bound.profile_index, 1);
        }
    }

    #[test]
    fn commercial_sampling_is_bounded() {
        let pools = ProfilePools::new(pool("residential", &[1.0], 1), pool("commercial", &[8.0, 9.0], 1));
        let mut sampler = ProfileSampler::new(&pools, 7, Some(DayOfYear::new(1).unwrap()), 25);
        let err = sampler.sample(0, &load(3, Some(10.0))).unwrap_err();
        assert!(matches!(
            err,
            CompilerError::ProfileSamplingExhausted { attempts: 25, .. }
        ));
    }

    #[test]
    fn commercial_requires_capacity() {
        let pools = ProfilePools::new(pool("residential", &[1.0], 1), pool("commercial", &[1.0], 1));
        let mut sampler = ProfileSampler::new(&pools, 7, Some(DayOfYear::new(1).unwrap()), 5);
        assert!(matches!(
            sampler.sample(0, &load(3, None)),
            Err(CompilerError::MissingAttribute { attribute: "tx_cap", .. })
        ));
    }

    #[test]
    fn day_beyond_pool_and_empty_pool_fail() {
        let pools = ProfilePools::new(pool("residential", &[1.0], 10), ProfilePool::empty("commercial"));
        let mut sampler = ProfileSampler::new(&pools, 1, Some(DayOfYear::new(11).unwrap()), 5);
        assert!(matches!(
            sampler.sample(0, &load(1, None)),
            Err(CompilerError::DayOutOfRange { available: 10, requested: 11, .. })
        ));
        assert!(matches!(
            sampler.sample(1, &load(3, Some(10.0))),
            Err(CompilerError::EmptyProfilePool("commercial"))
        ));
    }

    #[test]
    fn same_seed_draws_same_day_and_profiles() {
        let pools = ProfilePools::new(pool("residential", &[1.0, 2.0, 3.0, 4.0], 365), pool("commercial", &[], 0));
        let run = || {
            let mut sampler = ProfileSampler::new(&pools, 100, None, 5);
            let picks: Vec<usize> = (0..20)
                .map(|i| sampler.sample(i, &load(1, None)).unwrap().profile_index)
                .collect();
            (sampler.day(), picks)
        };
        assert_eq!(run(), run());
    }
}
