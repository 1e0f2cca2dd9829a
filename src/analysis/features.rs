/// Derived-feature engine.
///
/// Turns one region's ordered aligned history into per-day derived variables.
/// Computation runs in three passes over the whole history:
///
/// 1. `SeriesTable::build` screens every raw variable against its plausible
///    range, adds the reconciled precipitation series and the configured
///    rolling windows.
/// 2. `build_baselines` derives the climatology of every anomaly input.
/// 3. `derive` computes the per-day features.
///
/// Nothing here fails. A value that cannot be computed is null, and when the
/// reason is more than "the input was missing" a `QualityEvent` records it.
/// Missing values are never treated as zero.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::analysis::climatology::{climatology_day, BaselineSet, ClimatologyBaseline};
use crate::analysis::rolling::rolling;
use crate::config::{DroughtConfig, EngineConfig, RECONCILED_PRECIPITATION};
use crate::model::{AlignedRecord, DerivedFeatures, FeatureError, QualityEvent, Season, Variable};
use crate::regions::Region;

// ============================================================================
// Series table
// ============================================================================

/// Screened daily series of one region, keyed by series name.
#[derive(Debug, Clone)]
pub struct SeriesTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
    /// Inputs removed by screening, by `(day index, variable)`.
    rejected: BTreeMap<(usize, Variable), FeatureError>,
    events: Vec<QualityEvent>,
}

/// Checks one raw value against the variable's plausible range.
pub fn screen(variable: Variable, value: f64) -> Result<f64, FeatureError> {
    let input = variable.column().to_string();
    if !value.is_finite() {
        return Err(FeatureError::NonFinite { input });
    }
    let (min, max) = variable.plausible_range();
    if value < min || value > max {
        return Err(FeatureError::OutOfRange { input, value, min, max });
    }
    Ok(value)
}

impl SeriesTable {
    pub fn build(records: &[AlignedRecord], config: &EngineConfig) -> Self {
        let mut table = SeriesTable {
            dates: records.iter().map(|r| r.date).collect(),
            columns: BTreeMap::new(),
            rejected: BTreeMap::new(),
            events: Vec::new(),
        };

        for variable in Variable::ALL {
            let mut series = Vec::with_capacity(records.len());
            for (i, record) in records.iter().enumerate() {
                let screened = match record.get(variable) {
                    None => None,
                    Some(value) => match screen(variable, value) {
                        Ok(v) => Some(v),
                        Err(reason) => {
                            table.events.push(QualityEvent {
                                date: record.date,
                                feature: variable.column().to_string(),
                                reason: reason.clone(),
                            });
                            table.rejected.insert((i, variable), reason);
                            None
                        }
                    },
                };
                series.push(screened);
            }
            table.columns.insert(variable.column().to_string(), series);
        }

        let reconciled: Vec<Option<f64>> = (0..records.len())
            .map(|i| {
                table
                    .value(Variable::PrecipitationEra5Mm.column(), i)
                    .or_else(|| table.value(Variable::PrecipitationChirpsMm.column(), i))
            })
            .collect();
        table.columns.insert(RECONCILED_PRECIPITATION.to_string(), reconciled);

        for spec in &config.rolling {
            let out = match table.columns.get(&spec.input) {
                Some(input) => rolling(input, spec.window, spec.min_valid, spec.stat),
                None => vec![None; records.len()],
            };
            table.columns.insert(spec.name.clone(), out);
        }

        table
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn series(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|s| s.as_slice())
    }

    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.columns.get(name).and_then(|s| s.get(index).copied().flatten())
    }

    /// Screening events, in day then variable order.
    pub fn screening_events(&self) -> &[QualityEvent] {
        &self.events
    }

    fn rejection(&self, index: usize, inputs: &[Variable]) -> Option<&FeatureError> {
        inputs.iter().find_map(|v| self.rejected.get(&(index, *v)))
    }
}

// ============================================================================
// Baselines
// ============================================================================

/// One baseline per distinct anomaly input, built over the full history.
pub fn build_baselines(table: &SeriesTable, config: &EngineConfig) -> BaselineSet {
    let mut baselines = BaselineSet::new();
    for spec in &config.anomaly {
        if baselines.contains_key(&spec.input) {
            continue;
        }
        if let Some(series) = table.series(&spec.input) {
            let baseline = ClimatologyBaseline::build(&spec.input, table.dates(), series, &config.baseline);
            baselines.insert(spec.input.clone(), baseline);
        }
    }
    baselines
}

// ============================================================================
// Per-day features
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FeatureOutput {
    /// Parallel to the input records.
    pub features: Vec<DerivedFeatures>,
    /// Ordered by date, then feature name.
    pub events: Vec<QualityEvent>,
}

/// Screen, baseline and derive in one call.
pub fn compute_features(region: &Region, records: &[AlignedRecord], config: &EngineConfig) -> FeatureOutput {
    let table = SeriesTable::build(records, config);
    let baselines = build_baselines(&table, config);
    derive(region, &table, &baselines, config)
}

/// Composite drought index. Components are the negated precipitation
/// anomaly, the temperature anomaly and the negated soil-moisture anomaly,
/// each clipped to `[-clip, clip]`; missing temperature or soil components
/// drop out of the weighted mean. Positive values are drier than normal.
pub fn drought_index(
    precipitation_anomaly: Option<f64>,
    temperature_anomaly: Option<f64>,
    soil_moisture_anomaly: Option<f64>,
    config: &DroughtConfig,
) -> Option<f64> {
    let clip = |v: f64| v.clamp(-config.clip, config.clip);
    let p = precipitation_anomaly?;

    let mut weighted = config.precipitation_weight * clip(-p);
    let mut total_weight = config.precipitation_weight;
    if let Some(t) = temperature_anomaly {
        weighted += config.temperature_weight * clip(t);
        total_weight += config.temperature_weight;
    }
    if let Some(s) = soil_moisture_anomaly {
        weighted += config.soil_moisture_weight * clip(-s);
        total_weight += config.soil_moisture_weight;
    }
    if total_weight <= 0.0 {
        return None;
    }
    Some(weighted / total_weight)
}

/// Direction the wind vector points to, degrees in `[0, 360)`.
pub fn wind_direction_deg(u: f64, v: f64) -> f64 {
    let deg = v.atan2(u).to_degrees().rem_euclid(360.0);
    if deg >= 360.0 { 0.0 } else { deg + 0.0 }
}

fn push_event(events: &mut Vec<QualityEvent>, date: NaiveDate, feature: &str, reason: FeatureError) {
    events.push(QualityEvent {
        date,
        feature: feature.to_string(),
        reason,
    });
}

/// Nulls a non-finite result and records why.
fn checked(value: Option<f64>, feature: &str, date: NaiveDate, events: &mut Vec<QualityEvent>) -> Option<f64> {
    match value {
        Some(v) if !v.is_finite() => {
            push_event(events, date, feature, FeatureError::NonFinite { input: feature.to_string() });
            None
        }
        other => other,
    }
}

pub fn derive(region: &Region, table: &SeriesTable, baselines: &BaselineSet, config: &EngineConfig) -> FeatureOutput {
    let n = table.len();
    let dates = table.dates();
    let mut events: Vec<QualityEvent> = table.screening_events().to_vec();

    // Anomalies, with their failure reasons kept for the drought index.
    let mut anomalies: BTreeMap<&str, Vec<Option<f64>>> = BTreeMap::new();
    let mut anomaly_failures: BTreeMap<(&str, usize), FeatureError> = BTreeMap::new();
    for spec in &config.anomaly {
        let baseline = baselines.get(&spec.input);
        let mut series = Vec::with_capacity(n);
        for (i, date) in dates.iter().enumerate() {
            let value = table.value(&spec.input, i);
            let result = match (baseline, value) {
                (_, None) => Ok(None),
                (Some(b), value) => b.anomaly(*date, value),
                (None, Some(_)) => Err(FeatureError::IncompleteBaseline {
                    input: spec.input.clone(),
                    day_of_year: climatology_day(*date),
                }),
            };
            match result {
                Ok(v) => series.push(v),
                Err(reason) => {
                    push_event(&mut events, *date, &spec.name, reason.clone());
                    anomaly_failures.insert((spec.name.as_str(), i), reason);
                    series.push(None);
                }
            }
        }
        anomalies.insert(spec.name.as_str(), series);
    }
    let anomaly_at = |name: &str, i: usize| anomalies.get(name).and_then(|s| s.get(i).copied().flatten());

    let gdd = &config.growing_degree_days;
    let drought = &config.drought;
    let temperature = Variable::TemperatureEra5C.column();

    let mut features = Vec::with_capacity(n);
    let mut cycle_total: Option<f64> = Some(0.0);
    let mut dry_run: Option<u32> = Some(0);

    for (i, &date) in dates.iter().enumerate() {
        // Reconciled precipitation
        let precipitation_mm = table.value(RECONCILED_PRECIPITATION, i);
        if precipitation_mm.is_none() {
            if let Some(reason) = table.rejection(i, &[Variable::PrecipitationEra5Mm, Variable::PrecipitationChirpsMm]) {
                push_event(&mut events, date, RECONCILED_PRECIPITATION, reason.clone());
            }
        }

        // Growing degree days
        let growing_degree_days = table.value(temperature, i).map(|t| (t - gdd.base_temperature_c).max(0.0));
        if growing_degree_days.is_none() {
            if let Some(reason) = table.rejection(i, &[Variable::TemperatureEra5C]) {
                push_event(&mut events, date, "growing_degree_days", reason.clone());
            }
        }
        if i > 0 && date.month() == gdd.cycle_start_month && date.day() == gdd.cycle_start_day {
            cycle_total = Some(0.0);
        }
        cycle_total = match (cycle_total, growing_degree_days) {
            (Some(total), Some(g)) => Some(total + g),
            _ => None,
        };

        // Drought index
        let drought_index = drought_index(
            anomaly_at(&drought.precipitation_anomaly, i),
            anomaly_at(&drought.temperature_anomaly, i),
            anomaly_at(&drought.soil_moisture_anomaly, i),
            drought,
        );
        if drought_index.is_none() {
            if let Some(reason) = anomaly_failures.get(&(drought.precipitation_anomaly.as_str(), i)) {
                push_event(&mut events, date, "drought_index", reason.clone());
            }
        }

        // Wind
        let u = table.value(Variable::WindUMs.column(), i);
        let v = table.value(Variable::WindVMs.column(), i);
        let (wind_speed_ms, wind_direction) = match (u, v) {
            (Some(u), Some(v)) => (Some(u.hypot(v)), Some(wind_direction_deg(u, v))),
            _ => {
                if let Some(reason) = table.rejection(i, &[Variable::WindUMs, Variable::WindVMs]) {
                    push_event(&mut events, date, "wind_speed_ms", reason.clone());
                }
                (None, None)
            }
        };

        // MODIS composites
        let day_c = table.value(Variable::TemperatureDayModisC.column(), i);
        let night_c = table.value(Variable::TemperatureNightModisC.column(), i);
        let temperature_amplitude_c = day_c.zip(night_c).map(|(d, n)| d - n);
        if temperature_amplitude_c.is_none() {
            if let Some(reason) = table.rejection(i, &[Variable::TemperatureDayModisC, Variable::TemperatureNightModisC]) {
                push_event(&mut events, date, "temperature_amplitude_c", reason.clone());
            }
        }

        let ndvi = table.value(Variable::Ndvi.column(), i);
        let evi = table.value(Variable::Evi.column(), i);
        let vegetation_health_index = ndvi.zip(evi).map(|(a, b)| (a + b) / 2.0);
        if vegetation_health_index.is_none() {
            if let Some(reason) = table.rejection(i, &[Variable::Ndvi, Variable::Evi]) {
                push_event(&mut events, date, "vegetation_health_index", reason.clone());
            }
        }

        // Dry spell: unknown after a missing day until the next wet day.
        dry_run = match precipitation_mm {
            None => None,
            Some(p) if p >= config.dry_day_threshold_mm => Some(0),
            Some(_) => dry_run.map(|r| r + 1),
        };

        let rolling = config
            .rolling
            .iter()
            .map(|spec| {
                let value = checked(table.value(&spec.name, i), &spec.name, date, &mut events);
                (spec.name.clone(), value)
            })
            .collect();
        let anomaly_values = config
            .anomaly
            .iter()
            .map(|spec| (spec.name.clone(), anomaly_at(&spec.name, i)))
            .collect();

        let is_rainy_season = region.is_rainy_month(date.month());
        features.push(DerivedFeatures {
            precipitation_mm,
            growing_degree_days,
            growing_degree_days_cycle: checked(cycle_total, "growing_degree_days_cycle", date, &mut events),
            rolling,
            anomalies: anomaly_values,
            drought_index: checked(drought_index, "drought_index", date, &mut events),
            wind_speed_ms,
            wind_direction_deg: wind_direction,
            temperature_amplitude_c,
            vegetation_health_index,
            consecutive_dry_days: dry_run,
            is_rainy_season,
            season: if is_rainy_season { Season::Rainy } else { Season::Dry },
        });
    }

    events.sort_by(|a, b| (a.date, &a.feature).cmp(&(b.date, &b.feature)));
    FeatureOutput { features, events }
}

// ============================================================================
// Tests
// ============================================================================
