//! Engine configuration.
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields the standard feature set. Minimum valid counts for
//! rolling windows, baseline depth and drought weights are tunable here
//! rather than fixed in code.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{ReliabilityTier, Variable};
use crate::output::FIXED_COLUMNS;

/// Name of the reconciled precipitation series (ERA5, else CHIRPS).
pub const RECONCILED_PRECIPITATION: &str = "precipitation_mm";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub growing_degree_days: GddConfig,
    pub rolling: Vec<RollingSpec>,
    pub anomaly: Vec<AnomalySpec>,
    pub baseline: BaselineConfig,
    pub drought: DroughtConfig,
    pub completeness: CompletenessConfig,
    pub limits: LimitsConfig,
    /// Daily precipitation below this counts as a dry day.
    pub dry_day_threshold_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GddConfig {
    pub base_temperature_c: f64,
    /// Month on which the growing cycle (and the accumulated sum) resets.
    pub cycle_start_month: u32,
    pub cycle_start_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingStat {
    Mean,
    Sum,
}

/// An N-day trailing window over one input series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollingSpec {
    /// Output column name.
    pub name: String,
    /// A variable column or `precipitation_mm`.
    pub input: String,
    pub window: usize,
    /// Windows with fewer non-null inputs than this produce null.
    pub min_valid: usize,
    pub stat: RollingStat,
}

/// A standardized anomaly of one series against its climatology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnomalySpec {
    pub name: String,
    /// A variable column, `precipitation_mm`, or a rolling feature name.
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineConfig {
    /// Distinct years required before a day-of-year baseline is defined.
    pub min_years: usize,
    /// Days on each side of a day-of-year pooled into its baseline.
    pub window_half_width_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DroughtConfig {
    pub precipitation_anomaly: String,
    pub temperature_anomaly: String,
    pub soil_moisture_anomaly: String,
    pub precipitation_weight: f64,
    pub temperature_weight: f64,
    pub soil_moisture_weight: f64,
    /// Each component is clipped to `[-clip, clip]` before weighting.
    pub clip: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletenessConfig {
    pub complete_weight: f64,
    pub high_weight: f64,
    pub sparse_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Upper bound on the aligned history of one region, in days.
    pub max_history_days: usize,
}

// ============================================================================
// Defaults
// ============================================================================

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            growing_degree_days: GddConfig::default(),
            rolling: vec![
                RollingSpec::new("temperature_mean_7d", "temperature_era5_c", 7, 5, RollingStat::Mean),
                RollingSpec::new("precipitation_cumulative_7d", RECONCILED_PRECIPITATION, 7, 5, RollingStat::Sum),
                RollingSpec::new("precipitation_cumulative_30d", RECONCILED_PRECIPITATION, 30, 24, RollingStat::Sum),
                RollingSpec::new("ndvi_mean_30d", "ndvi", 30, 2, RollingStat::Mean),
            ],
            anomaly: vec![
                AnomalySpec::new("precipitation_anomaly", "precipitation_cumulative_30d"),
                AnomalySpec::new("temperature_anomaly", "temperature_mean_7d"),
                AnomalySpec::new("soil_moisture_anomaly", "soil_moisture"),
                AnomalySpec::new("ndvi_anomaly", "ndvi"),
            ],
            baseline: BaselineConfig::default(),
            drought: DroughtConfig::default(),
            completeness: CompletenessConfig::default(),
            limits: LimitsConfig::default(),
            dry_day_threshold_mm: 0.1,
        }
    }
}

impl Default for GddConfig {
    fn default() -> Self {
        Self {
            base_temperature_c: 10.0,
            cycle_start_month: 6,
            cycle_start_day: 1,
        }
    }
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            min_years: 3,
            window_half_width_days: 7,
        }
    }
}

impl Default for DroughtConfig {
    fn default() -> Self {
        Self {
            precipitation_anomaly: "precipitation_anomaly".to_string(),
            temperature_anomaly: "temperature_anomaly".to_string(),
            soil_moisture_anomaly: "soil_moisture_anomaly".to_string(),
            precipitation_weight: 0.5,
            temperature_weight: 0.25,
            soil_moisture_weight: 0.25,
            clip: 3.0,
        }
    }
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            complete_weight: 1.0,
            high_weight: 0.7,
            sparse_weight: 0.3,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_history_days: 36_600,
        }
    }
}

impl RollingSpec {
    pub fn new(name: &str, input: &str, window: usize, min_valid: usize, stat: RollingStat) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            window,
            min_valid,
            stat,
        }
    }
}

impl AnomalySpec {
    pub fn new(name: &str, input: &str) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
        }
    }
}

impl CompletenessConfig {
    pub fn weight_for(&self, tier: ReliabilityTier) -> f64 {
        match tier {
            ReliabilityTier::Complete => self.complete_weight,
            ReliabilityTier::High => self.high_weight,
            ReliabilityTier::Sparse => self.sparse_weight,
        }
    }
}

// ============================================================================
// Loading and validation
// ============================================================================

/// Load and validate an engine configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    EngineConfig::from_toml_str(&text)
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Names of the series every rolling window may read from.
    pub fn base_series_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Variable::ALL.iter().map(|v| v.column()).collect();
        names.push(RECONCILED_PRECIPITATION);
        names
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let gdd = &self.growing_degree_days;
        if !gdd.base_temperature_c.is_finite() {
            return invalid("growing_degree_days.base_temperature_c must be finite".into());
        }
        // 2001 is not a leap year, so a Feb 29 cycle start is rejected.
        if NaiveDate::from_ymd_opt(2001, gdd.cycle_start_month, gdd.cycle_start_day).is_none() {
            return invalid(format!(
                "growing cycle start {:02}-{:02} is not a valid calendar day",
                gdd.cycle_start_month, gdd.cycle_start_day
            ));
        }

        let base = Self::base_series_names();
        let mut series: HashSet<String> = base.iter().map(|s| s.to_string()).collect();
        for spec in &self.rolling {
            if spec.window == 0 {
                return invalid(format!("rolling '{}': window must be at least 1", spec.name));
            }
            if spec.min_valid == 0 || spec.min_valid > spec.window {
                return invalid(format!(
                    "rolling '{}': min_valid must be in 1..={}, got {}",
                    spec.name, spec.window, spec.min_valid
                ));
            }
            if !base.contains(&spec.input.as_str()) {
                return invalid(format!("rolling '{}': unknown input '{}'", spec.name, spec.input));
            }
            if FIXED_COLUMNS.contains(&spec.name.as_str()) || !series.insert(spec.name.clone()) {
                return invalid(format!("rolling '{}': name already in use", spec.name));
            }
        }

        let mut anomaly_names = HashSet::new();
        for spec in &self.anomaly {
            if !series.contains(&spec.input) {
                return invalid(format!("anomaly '{}': unknown input '{}'", spec.name, spec.input));
            }
            if series.contains(&spec.name)
                || FIXED_COLUMNS.contains(&spec.name.as_str())
                || !anomaly_names.insert(spec.name.clone())
            {
                return invalid(format!("anomaly '{}': name already in use", spec.name));
            }
        }

        let b = &self.baseline;
        if b.min_years < 2 {
            return invalid("baseline.min_years must be at least 2".into());
        }
        if b.window_half_width_days > 30 {
            return invalid("baseline.window_half_width_days must be at most 30".into());
        }

        let d = &self.drought;
        for (label, name) in [
            ("precipitation_anomaly", &d.precipitation_anomaly),
            ("temperature_anomaly", &d.temperature_anomaly),
            ("soil_moisture_anomaly", &d.soil_moisture_anomaly),
        ] {
            if !anomaly_names.contains(name) {
                return invalid(format!("drought.{} refers to unknown anomaly '{}'", label, name));
            }
        }
        let weights = [d.precipitation_weight, d.temperature_weight, d.soil_moisture_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return invalid("drought weights must be finite and non-negative".into());
        }
        if d.precipitation_weight <= 0.0 {
            return invalid("drought.precipitation_weight must be positive".into());
        }
        if !(d.clip.is_finite() && d.clip > 0.0) {
            return invalid("drought.clip must be positive".into());
        }

        let c = &self.completeness;
        let tiers = [c.complete_weight, c.high_weight, c.sparse_weight];
        if tiers.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return invalid("completeness weights must be positive".into());
        }

        if self.limits.max_history_days == 0 {
            return invalid("limits.max_history_days must be positive".into());
        }
        if !(self.dry_day_threshold_mm.is_finite() && self.dry_day_threshold_mm >= 0.0) {
            return invalid("dry_day_threshold_mm must be non-negative".into());
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
