//! Crash-rate risk ratios, with bootstrap percentile intervals.
//!
//! A unit's risk ratio is its crash rate (crashes per unit of exposure, e.g. resident
//! population) divided by the rate across all units. Uncertainty comes from resampling
//! the crash records with replacement.

use crate::{
    input::{self, Header},
    layout::UnitId,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};
use thiserror::Error;

/// Crash severity classification.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    parse_display::Display,
    parse_display::FromStr,
    Serialize,
    Deserialize,
)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Slight,
    Serious,
    Fatal,
}

impl Severity {
    /// Killed or seriously injured.
    pub fn is_ksi(self) -> bool {
        matches!(self, Severity::Serious | Severity::Fatal)
    }
}

/// One crash: `unit_id,severity`.
#[derive(Clone, Debug, PartialEq, Eq, parse_display::Display, parse_display::FromStr)]
#[display("{unit_id},{severity}")]
pub struct CrashRecord {
    pub unit_id: UnitId,
    pub severity: Severity,
}

/// One line of an exposure table: `unit_id,population`.
#[derive(Clone, Debug, PartialEq, parse_display::Display, parse_display::FromStr)]
#[display("{unit_id},{population}")]
pub struct ExposureRecord {
    pub unit_id: UnitId,
    pub population: f64,
}

/// Exposure per unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Exposure(BTreeMap<UnitId, f64>);

impl Exposure {
    /// Build an exposure table. Later records for the same unit replace earlier ones.
    ///
    /// Every exposure must be positive and finite.
    pub fn new(records: impl IntoIterator<Item = ExposureRecord>) -> Result<Self, Error> {
        let mut table = BTreeMap::new();
        for record in records {
            if !(record.population.is_finite() && record.population > 0.0) {
                return Err(Error::InvalidExposure {
                    unit_id: record.unit_id,
                    population: record.population,
                });
            }
            if table.insert(record.unit_id.clone(), record.population).is_some() {
                tracing::warn!(unit = %record.unit_id, "exposure given more than once; keeping the last");
            }
        }
        Ok(Exposure(table))
    }

    /// Load an exposure table with a header line.
    pub fn load(path: &Path) -> Result<Self, Error> {
        Self::new(input::parse::<ExposureRecord>(path, Header::Skip)?)
    }

    pub fn get(&self, unit_id: &str) -> Option<f64> {
        self.0.get(unit_id).copied()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = (&UnitId, f64)> {
        self.0.iter().map(|(unit, exposure)| (unit, *exposure))
    }
}

/// Load previously written risk ratio estimates, keyed by unit.
pub fn load_estimates(path: &Path) -> Result<HashMap<UnitId, RiskRatio>, Error> {
    Ok(input::parse::<RiskRatio>(path, Header::Skip)?
        .map(|estimate| (estimate.unit_id.clone(), estimate))
        .collect())
}

/// Load crash records with a header line.
pub fn load_crashes(path: &Path) -> Result<Vec<CrashRecord>, Error> {
    Ok(input::parse(path, Header::Skip)?.collect())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Number of resamples.
    pub iterations: usize,
    /// Confidence level of the percentile interval, in `(0, 1)`.
    pub level: f64,
    pub seed: u64,
    /// Count only killed-or-seriously-injured crashes.
    pub ksi_only: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            iterations: 1000,
            level: 0.95,
            seed: 20_190_101,
            ksi_only: false,
        }
    }
}

/// Risk ratio estimate for one unit.
///
/// Displays as, and parses from, `unit_id,count,exposure,ratio,lower,upper`.
#[derive(Clone, Debug, PartialEq, parse_display::Display, parse_display::FromStr)]
#[display("{unit_id},{count},{exposure},{ratio},{lower},{upper}")]
pub struct RiskRatio {
    pub unit_id: UnitId,
    pub count: usize,
    pub exposure: f64,
    pub ratio: f64,
    pub lower: f64,
    pub upper: f64,
}

impl RiskRatio {
    pub const HEADER: &'static str = "unit_id,count,exposure,ratio,lower,upper";

    /// `true` when the interval excludes the reference rate.
    pub fn is_distinct(&self) -> bool {
        self.lower > 1.0 || self.upper < 1.0
    }
}

/// Risk ratios for every unit with exposure, plus what was left out.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskReport {
    /// One per exposure unit, ordered by unit id.
    pub estimates: Vec<RiskRatio>,
    /// Records whose unit has no exposure.
    pub unmatched_records: usize,
    /// Records removed by the severity filter.
    pub filtered_records: usize,
}

/// Linearly interpolated quantile of sorted data (the "type 7" definition).
///
/// `sorted` must be non-empty and ascending; `p` is clamped to `[0, 1]`.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let low = h.floor() as usize;
    let high = (low + 1).min(sorted.len() - 1);
    sorted[low] + (h - low as f64) * (sorted[high] - sorted[low])
}

/// Compute risk ratios with bootstrap percentile intervals.
///
/// Records are first filtered by severity (if configured), then joined to `exposure`;
/// records without exposure are counted, not fatal. Given the same seed and inputs,
/// the output is identical.
pub fn risk_ratios(
    records: &[CrashRecord],
    exposure: &Exposure,
    config: &BootstrapConfig,
) -> Result<RiskReport, Error> {
    if !(config.level > 0.0 && config.level < 1.0) {
        return Err(Error::InvalidLevel(config.level));
    }
    if exposure.is_empty() {
        return Err(Error::NoExposure);
    }

    let units: Vec<(&UnitId, f64)> = exposure.iter().collect();
    let position: BTreeMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(idx, (unit, _))| (unit.as_str(), idx))
        .collect();

    let mut filtered_records = 0;
    let mut unmatched_records = 0;
    let mut joined = Vec::with_capacity(records.len());
    for record in records {
        if config.ksi_only && !record.severity.is_ksi() {
            filtered_records += 1;
            continue;
        }
        match position.get(record.unit_id.as_str()) {
            Some(&idx) => joined.push(idx),
            None => {
                tracing::debug!(unit = %record.unit_id, "crash record has no exposure");
                unmatched_records += 1;
            }
        }
    }
    if unmatched_records > 0 {
        tracing::warn!(count = unmatched_records, "crash records without exposure were left out");
    }
    if joined.is_empty() {
        return Err(Error::NoRecords);
    }

    let n = joined.len();
    let national_rate = n as f64 / exposure.total();
    let ratios = |counts: &[usize]| -> Vec<f64> {
        counts
            .iter()
            .zip(&units)
            .map(|(&count, (_, exposure))| count as f64 / exposure / national_rate)
            .collect()
    };

    let mut counts = vec![0; units.len()];
    for &idx in &joined {
        counts[idx] += 1;
    }
    let point = ratios(&counts);

    let mut samples = vec![Vec::with_capacity(config.iterations); units.len()];
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut resampled = vec![0; units.len()];
    for _ in 0..config.iterations {
        resampled.iter_mut().for_each(|count| *count = 0);
        for _ in 0..n {
            resampled[joined[rng.gen_range(0..n)]] += 1;
        }
        for (sample, ratio) in samples.iter_mut().zip(ratios(&resampled)) {
            sample.push(ratio);
        }
    }

    let alpha = 1.0 - config.level;
    let estimates = units
        .iter()
        .zip(counts)
        .zip(point)
        .zip(samples)
        .map(|((((unit_id, exposure), count), ratio), mut sample)| {
            let (lower, upper) = if sample.is_empty() {
                (ratio, ratio)
            } else {
                sample.sort_by(f64::total_cmp);
                (
                    quantile(&sample, alpha / 2.0),
                    quantile(&sample, 1.0 - alpha / 2.0),
                )
            };
            RiskRatio {
                unit_id: (*unit_id).clone(),
                count,
                exposure: *exposure,
                ratio,
                lower,
                upper,
            }
        })
        .collect();

    tracing::info!(
        units = units.len(),
        records = n,
        iterations = config.iterations,
        "computed risk ratios"
    );

    Ok(RiskReport {
        estimates,
        unmatched_records,
        filtered_records,
    })
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("reading rate inputs")]
    Io(#[from] std::io::Error),
    #[error("exposure for {unit_id} must be positive and finite; got {population}")]
    InvalidExposure { unit_id: UnitId, population: f64 },
    #[error("confidence level must lie strictly between 0 and 1; got {0}")]
    InvalidLevel(f64),
    #[error("exposure table is empty")]
    NoExposure,
    #[error("no crash records remain after filtering and joining")]
    NoRecords,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exposure(entries: &[(&str, f64)]) -> Exposure {
        Exposure::new(entries.iter().map(|(unit, population)| ExposureRecord {
            unit_id: unit.to_string(),
            population: *population,
        }))
        .unwrap()
    }

    fn crashes(entries: &[(&str, Severity, usize)]) -> Vec<CrashRecord> {
        entries
            .iter()
            .flat_map(|(unit, severity, count)| {
                std::iter::repeat(CrashRecord {
                    unit_id: unit.to_string(),
                    severity: *severity,
                })
                .take(*count)
            })
            .collect()
    }

    #[test]
    fn test_parse_records() {
        let data = "unit_id,severity\nE06000001,serious\nE06000002,slight\nE06000003,unknown\n";
        let records: Vec<CrashRecord> = input::parse_str(data, Header::Skip).unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity, Severity::Serious);
        assert!(records[0].severity.is_ksi());
        assert!(!records[1].severity.is_ksi());
    }

    #[test]
    fn test_point_estimates() {
        let exposure = exposure(&[("a", 1000.0), ("b", 3000.0)]);
        let records = crashes(&[("a", Severity::Slight, 30), ("b", Severity::Slight, 10)]);
        let report = risk_ratios(&records, &exposure, &BootstrapConfig::default()).unwrap();

        // national rate is 40 / 4000 = 0.01
        let a = &report.estimates[0];
        assert_eq!(a.unit_id, "a");
        assert_eq!(a.count, 30);
        assert_relative_eq!(a.ratio, 3.0);
        let b = &report.estimates[1];
        assert_relative_eq!(b.ratio, 10.0 / 3000.0 / 0.01);
    }

    #[test]
    fn test_interval_brackets_estimate() {
        let exposure = exposure(&[("a", 1000.0), ("b", 3000.0), ("c", 2000.0)]);
        let records = crashes(&[
            ("a", Severity::Slight, 60),
            ("b", Severity::Serious, 50),
            ("c", Severity::Fatal, 40),
        ]);
        let report = risk_ratios(&records, &exposure, &BootstrapConfig::default()).unwrap();
        for estimate in &report.estimates {
            assert!(
                estimate.lower <= estimate.ratio && estimate.ratio <= estimate.upper,
                "{}",
                estimate
            );
            assert!(estimate.lower < estimate.upper);
        }
        assert!(report.estimates[0].is_distinct());
    }

    #[test]
    fn test_same_seed_same_output() {
        let exposure = exposure(&[("a", 1000.0), ("b", 3000.0)]);
        let records = crashes(&[("a", Severity::Slight, 12), ("b", Severity::Serious, 7)]);
        let config = BootstrapConfig {
            iterations: 200,
            ..BootstrapConfig::default()
        };
        let first = risk_ratios(&records, &exposure, &config).unwrap();
        let second = risk_ratios(&records, &exposure, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unmatched_and_filtered_records_are_counted() {
        let exposure = exposure(&[("a", 1000.0)]);
        let records = crashes(&[
            ("a", Severity::Serious, 4),
            ("a", Severity::Slight, 3),
            ("z", Severity::Fatal, 2),
        ]);
        let config = BootstrapConfig {
            ksi_only: true,
            iterations: 10,
            ..BootstrapConfig::default()
        };
        let report = risk_ratios(&records, &exposure, &config).unwrap();
        assert_eq!(report.filtered_records, 3);
        assert_eq!(report.unmatched_records, 2);
        assert_eq!(report.estimates[0].count, 4);
    }

    #[test]
    fn test_no_records_is_an_error() {
        let exposure = exposure(&[("a", 1000.0)]);
        let records = crashes(&[("z", Severity::Fatal, 2)]);
        assert!(matches!(
            risk_ratios(&records, &exposure, &BootstrapConfig::default()),
            Err(Error::NoRecords)
        ));
    }

    #[test]
    fn test_invalid_exposure_rejected() {
        let result = Exposure::new(vec![ExposureRecord {
            unit_id: "a".into(),
            population: 0.0,
        }]);
        assert!(matches!(result, Err(Error::InvalidExposure { .. })));
    }

    #[test]
    fn test_quantile() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&data, 0.0), 1.0);
        assert_eq!(quantile(&data, 1.0), 5.0);
        assert_relative_eq!(quantile(&data, 0.5), 3.0);
        assert_relative_eq!(quantile(&data, 0.1), 1.4);
        assert_eq!(quantile(&[7.0], 0.3), 7.0);
    }

    #[test]
    fn test_risk_ratio_line() {
        let line = "E06000001,12,92000.5,1.25,0.8,1.9";
        let estimate: RiskRatio = line.parse().unwrap();
        assert_eq!(estimate.count, 12);
        assert!(!estimate.is_distinct());
        assert_eq!(estimate.to_string(), line);
    }
}
