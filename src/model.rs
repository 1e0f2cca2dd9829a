/// Core data types for the regional agro-climate consolidation service.
///
/// This module defines the shared domain model imported by all other modules:
/// source and variable identifiers, the record types that flow between the
/// pipeline stages, and the error taxonomy. It contains no I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stable identifier of a region in `regions::REGION_REGISTRY`.
pub type RegionId = &'static str;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// How complete a source's historical coverage is. Drives the weight a
/// missing variable carries in the completeness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityTier {
    /// Reanalysis products with a value for every day.
    Complete,
    /// Gauge-calibrated products with occasional gaps.
    High,
    /// Remote-sensing products limited by cloud cover or revisit cycles.
    Sparse,
}

/// One independent data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// ECMWF ERA5-Land daily aggregates.
    Era5,
    /// CHIRPS daily precipitation.
    Chirps,
    /// MODIS MOD11A1 land surface temperature.
    ModisLst,
    /// MODIS MOD13Q1 vegetation indices (16-day composites).
    ModisVi,
    /// SMAP 10 km surface soil moisture.
    Smap,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Era5,
        SourceId::Chirps,
        SourceId::ModisLst,
        SourceId::ModisVi,
        SourceId::Smap,
    ];

    /// Identifier used in input batches and configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Era5 => "era5",
            SourceId::Chirps => "chirps",
            SourceId::ModisLst => "modis_lst",
            SourceId::ModisVi => "modis_vi",
            SourceId::Smap => "smap",
        }
    }

    pub fn tier(&self) -> ReliabilityTier {
        match self {
            SourceId::Era5 => ReliabilityTier::Complete,
            SourceId::Chirps => ReliabilityTier::High,
            SourceId::ModisLst | SourceId::ModisVi | SourceId::Smap => ReliabilityTier::Sparse,
        }
    }

    /// Variables this source contributes to an aligned record.
    pub fn variables(&self) -> &'static [Variable] {
        match self {
            SourceId::Era5 => &[
                Variable::TemperatureEra5C,
                Variable::PrecipitationEra5Mm,
                Variable::SolarRadiationMjM2,
                Variable::WindUMs,
                Variable::WindVMs,
            ],
            SourceId::Chirps => &[Variable::PrecipitationChirpsMm],
            SourceId::ModisLst => &[Variable::TemperatureDayModisC, Variable::TemperatureNightModisC],
            SourceId::ModisVi => &[Variable::Ndvi, Variable::Evi],
            SourceId::Smap => &[Variable::SoilMoisture],
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Era5 => write!(f, "ERA5"),
            SourceId::Chirps => write!(f, "CHIRPS"),
            SourceId::ModisLst => write!(f, "MODIS_LST"),
            SourceId::ModisVi => write!(f, "MODIS_VI"),
            SourceId::Smap => write!(f, "SMAP"),
        }
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "era5" | "era5_land" => Ok(SourceId::Era5),
            "chirps" => Ok(SourceId::Chirps),
            "modis_lst" | "modis_temp" => Ok(SourceId::ModisLst),
            "modis_vi" => Ok(SourceId::ModisVi),
            "smap" => Ok(SourceId::Smap),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// A raw per-source variable carried by an aligned record.
///
/// Each variable belongs to exactly one source, so two sources measuring the
/// same quantity (ERA5 and CHIRPS precipitation) never share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    TemperatureEra5C,
    PrecipitationEra5Mm,
    SolarRadiationMjM2,
    WindUMs,
    WindVMs,
    PrecipitationChirpsMm,
    TemperatureDayModisC,
    TemperatureNightModisC,
    Ndvi,
    Evi,
    SoilMoisture,
}

impl Variable {
    /// All variables in output column order.
    pub const ALL: [Variable; 11] = [
        Variable::TemperatureEra5C,
        Variable::PrecipitationEra5Mm,
        Variable::SolarRadiationMjM2,
        Variable::WindUMs,
        Variable::WindVMs,
        Variable::PrecipitationChirpsMm,
        Variable::TemperatureDayModisC,
        Variable::TemperatureNightModisC,
        Variable::Ndvi,
        Variable::Evi,
        Variable::SoilMoisture,
    ];

    /// Column name in the persisted output row.
    pub fn column(&self) -> &'static str {
        match self {
            Variable::TemperatureEra5C => "temperature_era5_c",
            Variable::PrecipitationEra5Mm => "precipitation_era5_mm",
            Variable::SolarRadiationMjM2 => "solar_radiation_mj_m2",
            Variable::WindUMs => "wind_u_ms",
            Variable::WindVMs => "wind_v_ms",
            Variable::PrecipitationChirpsMm => "precipitation_chirps_mm",
            Variable::TemperatureDayModisC => "temperature_day_modis_c",
            Variable::TemperatureNightModisC => "temperature_night_modis_c",
            Variable::Ndvi => "ndvi",
            Variable::Evi => "evi",
            Variable::SoilMoisture => "soil_moisture",
        }
    }

    pub fn source(&self) -> SourceId {
        match self {
            Variable::TemperatureEra5C
            | Variable::PrecipitationEra5Mm
            | Variable::SolarRadiationMjM2
            | Variable::WindUMs
            | Variable::WindVMs => SourceId::Era5,
            Variable::PrecipitationChirpsMm => SourceId::Chirps,
            Variable::TemperatureDayModisC | Variable::TemperatureNightModisC => SourceId::ModisLst,
            Variable::Ndvi | Variable::Evi => SourceId::ModisVi,
            Variable::SoilMoisture => SourceId::Smap,
        }
    }

    /// Inclusive physically plausible range, in the variable's output unit.
    /// Values outside it are treated as sensor or retrieval faults.
    pub fn plausible_range(&self) -> (f64, f64) {
        match self {
            Variable::TemperatureEra5C
            | Variable::TemperatureDayModisC
            | Variable::TemperatureNightModisC => (-60.0, 70.0),
            Variable::PrecipitationEra5Mm | Variable::PrecipitationChirpsMm => (0.0, 1000.0),
            Variable::SolarRadiationMjM2 => (0.0, 50.0),
            Variable::WindUMs | Variable::WindVMs => (-75.0, 75.0),
            Variable::Ndvi | Variable::Evi => (-1.0, 1.0),
            Variable::SoilMoisture => (0.0, 1.0),
        }
    }

    pub fn from_column(column: &str) -> Option<Variable> {
        Variable::ALL.iter().copied().find(|v| v.column() == column)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Present values of one record. A variable absent from the map is null.
pub type VariableValues = BTreeMap<Variable, f64>;

// ---------------------------------------------------------------------------
// Source readings
// ---------------------------------------------------------------------------

/// The validated, fixed shape of one source's daily observation.
///
/// Decoded once by the source reader; nothing downstream inspects raw keys.
/// Values are already converted to output units.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceReading {
    Era5 {
        temperature_c: Option<f64>,
        precipitation_mm: Option<f64>,
        solar_radiation_mj_m2: Option<f64>,
        wind_u_ms: Option<f64>,
        wind_v_ms: Option<f64>,
    },
    Chirps {
        precipitation_mm: Option<f64>,
    },
    ModisLst {
        day_c: Option<f64>,
        night_c: Option<f64>,
    },
    ModisVi {
        ndvi: Option<f64>,
        evi: Option<f64>,
    },
    Smap {
        soil_moisture: Option<f64>,
    },
}

impl SourceReading {
    pub fn source(&self) -> SourceId {
        match self {
            SourceReading::Era5 { .. } => SourceId::Era5,
            SourceReading::Chirps { .. } => SourceId::Chirps,
            SourceReading::ModisLst { .. } => SourceId::ModisLst,
            SourceReading::ModisVi { .. } => SourceId::ModisVi,
            SourceReading::Smap { .. } => SourceId::Smap,
        }
    }

    /// Flattens the reading into `(variable, value)` pairs, nulls included.
    pub fn values(&self) -> Vec<(Variable, Option<f64>)> {
        match *self {
            SourceReading::Era5 {
                temperature_c,
                precipitation_mm,
                solar_radiation_mj_m2,
                wind_u_ms,
                wind_v_ms,
            } => vec![
                (Variable::TemperatureEra5C, temperature_c),
                (Variable::PrecipitationEra5Mm, precipitation_mm),
                (Variable::SolarRadiationMjM2, solar_radiation_mj_m2),
                (Variable::WindUMs, wind_u_ms),
                (Variable::WindVMs, wind_v_ms),
            ],
            SourceReading::Chirps { precipitation_mm } => {
                vec![(Variable::PrecipitationChirpsMm, precipitation_mm)]
            }
            SourceReading::ModisLst { day_c, night_c } => vec![
                (Variable::TemperatureDayModisC, day_c),
                (Variable::TemperatureNightModisC, night_c),
            ],
            SourceReading::ModisVi { ndvi, evi } => {
                vec![(Variable::Ndvi, ndvi), (Variable::Evi, evi)]
            }
            SourceReading::Smap { soil_moisture } => {
                vec![(Variable::SoilMoisture, soil_moisture)]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// One source's observation for one region and day.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub region_id: RegionId,
    pub source: SourceId,
    pub date: NaiveDate,
    pub reading: SourceReading,
}

/// One row of the canonical per-region date axis. Exists for every day in
/// range, even when every variable is null.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    pub region_id: RegionId,
    pub date: NaiveDate,
    pub values: VariableValues,
}

impl AlignedRecord {
    pub fn empty(region_id: RegionId, date: NaiveDate) -> Self {
        Self {
            region_id,
            date,
            values: VariableValues::new(),
        }
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied()
    }
}

/// Coarse seasonal label derived from the region's rainy-season window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Rainy,
    Dry,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::Rainy => write!(f, "Rainy"),
            Season::Dry => write!(f, "Dry"),
        }
    }
}

/// Derived variables computed by the feature engine for one day.
///
/// Rolling and anomaly features are keyed by their configured names so the
/// output row carries one column per configured feature.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFeatures {
    pub precipitation_mm: Option<f64>,
    pub growing_degree_days: Option<f64>,
    pub growing_degree_days_cycle: Option<f64>,
    pub rolling: BTreeMap<String, Option<f64>>,
    pub anomalies: BTreeMap<String, Option<f64>>,
    pub drought_index: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub temperature_amplitude_c: Option<f64>,
    pub vegetation_health_index: Option<f64>,
    pub consecutive_dry_days: Option<u32>,
    pub is_rainy_season: bool,
    pub season: Season,
}

impl DerivedFeatures {
    /// Every numeric derived value as `(column, value)`, in output order.
    pub fn numeric_columns(&self) -> Vec<(String, Option<f64>)> {
        let mut columns = vec![
            ("precipitation_mm".to_string(), self.precipitation_mm),
            ("growing_degree_days".to_string(), self.growing_degree_days),
            ("growing_degree_days_cycle".to_string(), self.growing_degree_days_cycle),
        ];
        columns.extend(self.rolling.iter().map(|(k, v)| (k.clone(), *v)));
        columns.extend(self.anomalies.iter().map(|(k, v)| (k.clone(), *v)));
        columns.extend([
            ("drought_index".to_string(), self.drought_index),
            ("wind_speed_ms".to_string(), self.wind_speed_ms),
            ("wind_direction_deg".to_string(), self.wind_direction_deg),
            ("temperature_amplitude_c".to_string(), self.temperature_amplitude_c),
            ("vegetation_health_index".to_string(), self.vegetation_health_index),
            (
                "consecutive_dry_days".to_string(),
                self.consecutive_dry_days.map(f64::from),
            ),
        ]);
        columns
    }
}

/// The unit persisted downstream: an aligned record plus derived variables,
/// a completeness score and the region's static metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedRecord {
    pub region_id: RegionId,
    pub region_name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
    pub values: VariableValues,
    pub derived: DerivedFeatures,
    pub completeness_score: f64,
}

impl ConsolidatedRecord {
    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied()
    }
}

/// A value nulled by the feature engine, with the reason it was nulled.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityEvent {
    pub date: NaiveDate,
    pub feature: String,
    pub reason: FeatureError,
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// An inclusive calendar-day range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Returns `None` if the range is inverted.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days, `end - start + 1`.
    pub fn num_days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every day in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Smallest range covering both `self` and `date`.
    pub fn extended_to(&self, date: NaiveDate) -> Self {
        Self {
            start: self.start.min(date),
            end: self.end.max(date),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Per-row rejections at the source reader. Counted, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// Reasons a derived value was nulled. Absorbed into null values plus a
/// logged data-quality event; never propagated to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("non-finite result for {input}")]
    NonFinite { input: String },

    #[error("{input} value {value} outside plausible range [{min}, {max}]")]
    OutOfRange {
        input: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("no baseline for {input} on day-of-year {day_of_year}")]
    IncompleteBaseline { input: String, day_of_year: u32 },
}

/// Structural failures that abort one region's run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineFailure {
    #[error("date range is inverted ({start} > {end})")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("region is not in the registry")]
    UnknownRegion,

    #[error("history spans {days} days, above the limit of {limit}")]
    RangeTooLong { days: usize, limit: usize },
}

/// A failure scoped to one region and one requested range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("region {region}, range {start}..{end} failed: {kind}")]
pub struct RegionPipelineError {
    pub region: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: PipelineFailure,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
