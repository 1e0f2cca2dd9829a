/// Day-of-year climatology and standardized anomalies.
///
/// A `ClimatologyBaseline` is built from one region's full aligned history
/// for a single series and lives for one consolidation run. It is passed to
/// the feature engine explicitly and never cached across runs.
///
/// Day-of-year uses a 365-day calendar: Feb 29 shares Feb 28's slot, so
/// every later day keeps the same slot in leap and common years. Each slot
/// pools the samples within `window_half_width_days` on either side (wrapping
/// over the year end) and is defined only once those samples span
/// `min_years` distinct years.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::config::BaselineConfig;
use crate::model::FeatureError;

const DAYS_IN_CLIMATOLOGY_YEAR: u32 = 365;

/// Standard deviations below this are treated as zero.
const MIN_STDDEV: f64 = 1e-12;

/// Slot of `date` in the 365-day climatology calendar, `1..=365`.
pub fn climatology_day(date: NaiveDate) -> u32 {
    let day = if date.month() == 2 && date.day() == 29 { 28 } else { date.day() };
    NaiveDate::from_ymd_opt(2001, date.month(), day)
        .map(|d| d.ordinal())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineStat {
    pub mean: f64,
    /// Sample standard deviation.
    pub stddev: f64,
    pub years: usize,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologyBaseline {
    input: String,
    /// Index `doy - 1`.
    slots: Vec<Option<BaselineStat>>,
}

impl ClimatologyBaseline {
    /// Build the baseline of one series. `dates` and `values` are parallel.
    pub fn build(input: &str, dates: &[NaiveDate], values: &[Option<f64>], config: &BaselineConfig) -> Self {
        let mut buckets: Vec<Vec<(i32, f64)>> = vec![Vec::new(); DAYS_IN_CLIMATOLOGY_YEAR as usize];
        for (date, value) in dates.iter().zip(values) {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                buckets[(climatology_day(*date) - 1) as usize].push((date.year(), v));
            }
        }

        let half = config.window_half_width_days as i64;
        let n = DAYS_IN_CLIMATOLOGY_YEAR as i64;
        let slots = (0..n)
            .map(|slot| {
                let mut years = BTreeSet::new();
                let mut pooled = Vec::new();
                for offset in -half..=half {
                    let idx = (slot + offset).rem_euclid(n) as usize;
                    for (year, v) in &buckets[idx] {
                        years.insert(*year);
                        pooled.push(*v);
                    }
                }
                if years.len() < config.min_years || pooled.len() < 2 {
                    return None;
                }
                let count = pooled.len() as f64;
                let mean = pooled.iter().sum::<f64>() / count;
                let variance = pooled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0);
                Some(BaselineStat {
                    mean,
                    stddev: variance.sqrt(),
                    years: years.len(),
                    samples: pooled.len(),
                })
            })
            .collect();

        Self {
            input: input.to_string(),
            slots,
        }
    }

    pub fn stat(&self, day_of_year: u32) -> Option<BaselineStat> {
        if day_of_year == 0 {
            return None;
        }
        self.slots.get((day_of_year - 1) as usize).copied().flatten()
    }

    /// Number of slots with a defined baseline.
    pub fn defined_days(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Standardized anomaly of `value` on `date`.
    ///
    /// A missing value is `Ok(None)`. A missing baseline for the date's slot
    /// is `IncompleteBaseline`. A zero standard deviation gives an anomaly of
    /// zero.
    pub fn anomaly(&self, date: NaiveDate, value: Option<f64>) -> Result<Option<f64>, FeatureError> {
        let Some(value) = value else {
            return Ok(None);
        };
        let day_of_year = climatology_day(date);
        let stat = self.stat(day_of_year).ok_or_else(|| FeatureError::IncompleteBaseline {
            input: self.input.clone(),
            day_of_year,
        })?;
        if stat.stddev.abs() < MIN_STDDEV {
            return Ok(Some(0.0));
        }
        let z = (value - stat.mean) / stat.stddev;
        if z.is_finite() {
            Ok(Some(z))
        } else {
            Err(FeatureError::NonFinite {
                input: self.input.clone(),
            })
        }
    }
}

/// Baselines of one run, keyed by input series name.
pub type BaselineSet = BTreeMap<String, ClimatologyBaseline>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config(min_years: usize, half: u32) -> BaselineConfig {
        BaselineConfig {
            min_years,
            window_half_width_days: half,
        }
    }

    #[test]
    fn test_climatology_day_ignores_leap_day() {
        assert_eq!(climatology_day(d(2023, 1, 1)), 1);
        assert_eq!(climatology_day(d(2024, 2, 29)), climatology_day(d(2024, 2, 28)));
        assert_eq!(climatology_day(d(2024, 3, 1)), climatology_day(d(2023, 3, 1)));
        assert_eq!(climatology_day(d(2024, 12, 31)), 365);
    }

    #[test]
    fn test_baseline_requires_min_years() {
        let dates = vec![d(2020, 6, 1), d(2021, 6, 1)];
        let values = vec![Some(1.0), Some(3.0)];
        let baseline = ClimatologyBaseline::build("ndvi", &dates, &values, &config(3, 0));
        let err = baseline.anomaly(d(2022, 6, 1), Some(2.0)).unwrap_err();
        assert!(matches!(err, FeatureError::IncompleteBaseline { .. }));
        assert_eq!(baseline.defined_days(), 0);
    }

    #[test]
    fn test_value_equal_to_mean_has_zero_anomaly() {
        let dates = vec![d(2020, 6, 1), d(2021, 6, 1), d(2022, 6, 1)];
        let values = vec![Some(1.0), Some(2.0), Some(3.0)];
        let baseline = ClimatologyBaseline::build("ndvi", &dates, &values, &config(3, 0));
        let stat = baseline.stat(climatology_day(d(2023, 6, 1))).unwrap();
        assert_relative_eq!(stat.mean, 2.0, epsilon = 1e-12);
        assert_relative_eq!(stat.stddev, 1.0, epsilon = 1e-12);
        assert_eq!(baseline.anomaly(d(2023, 6, 1), Some(2.0)), Ok(Some(0.0)));
        assert_relative_eq!(baseline.anomaly(d(2023, 6, 1), Some(4.0)).unwrap().unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_stddev_yields_zero_anomaly() {
        let dates = vec![d(2020, 6, 1), d(2021, 6, 1), d(2022, 6, 1)];
        let values = vec![Some(5.0); 3];
        let baseline = ClimatologyBaseline::build("soil_moisture", &dates, &values, &config(3, 0));
        assert_eq!(baseline.anomaly(d(2023, 6, 1), Some(9.0)), Ok(Some(0.0)));
    }

    #[test]
    fn test_missing_value_is_null_without_event() {
        let baseline = ClimatologyBaseline::build("ndvi", &[], &[], &config(3, 7));
        assert_eq!(baseline.anomaly(d(2023, 6, 1), None), Ok(None));
    }

    #[test]
    fn test_window_pools_neighbouring_days_across_year_end() {
        let dates = vec![d(2019, 12, 30), d(2020, 1, 2), d(2021, 12, 31)];
        let values = vec![Some(1.0), Some(2.0), Some(3.0)];
        let baseline = ClimatologyBaseline::build("t", &dates, &values, &config(3, 3));
        let stat = baseline.stat(1).expect("Jan 1 pools Dec 29 - Jan 4");
        assert_eq!(stat.samples, 3);
        assert_eq!(stat.years, 3);
        assert!(baseline.stat(180).is_none());
    }
}
