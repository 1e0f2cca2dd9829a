/// Per-source decoding of raw extractor rows.
///
/// Each source arrives with its own band names and units. This module maps a
/// row's loose `key -> value` fields onto the fixed `SourceReading` shape for
/// that source and converts every value to the unit used in output rows:
///
/// | Source    | Raw unit                         | Output unit |
/// |-----------|----------------------------------|-------------|
/// | ERA5      | K, m/day, J/m², m/s              | °C, mm/day, MJ/m², m/s |
/// | CHIRPS    | mm/day                           | mm/day      |
/// | MODIS LST | K, or scaled DN (×0.02 K)        | °C          |
/// | MODIS VI  | scaled DN (×0.0001) or unitless  | unitless    |
/// | SMAP      | fraction or percent              | fraction    |
///
/// Keys are matched case-insensitively. Unrecognized keys are ignored.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{SourceId, SourceReading};

const KELVIN_OFFSET: f64 = 273.15;
const MODIS_LST_SCALE: f64 = 0.02;
const MODIS_VI_SCALE: f64 = 0.0001;

// ============================================================================
// Field extraction
// ============================================================================

/// Finds the first of `keys` present in `fields` and parses it.
///
/// Nulls, empty strings and "nan" are missing values (`Ok(None)`); anything
/// that is not a number or a numeric string is an error.
fn field(fields: &BTreeMap<String, Value>, keys: &[&str]) -> Result<Option<f64>, String> {
    for key in keys {
        let found = fields
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v);
        if let Some(value) = found {
            return parse_value(key, value);
        }
    }
    Ok(None)
}

fn parse_value(key: &str, value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("'{}' is not representable as f64", key)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("nan") {
                Ok(None)
            } else {
                match s.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(Some(v)),
                    Ok(_) => Err(format!("'{}' has non-finite value '{}'", key, s)),
                    Err(_) => Err(format!("'{}' has non-numeric value '{}'", key, s)),
                }
            }
        }
        other => Err(format!("'{}' has unsupported value {}", key, other)),
    }
}

// ============================================================================
// Unit conversion
// ============================================================================

/// Values above 200 can only be Kelvin for surface temperatures.
fn to_celsius(value: f64) -> f64 {
    if value > 200.0 { value - KELVIN_OFFSET } else { value }
}

/// MOD11A1 bands are delivered as DN unless the extractor applied the scale.
fn modis_lst_to_celsius(value: f64) -> f64 {
    let kelvin = if value > 1000.0 { value * MODIS_LST_SCALE } else { value };
    to_celsius(kelvin)
}

fn modis_vi_to_unitless(value: f64) -> f64 {
    if value.abs() > 1.0 { value * MODIS_VI_SCALE } else { value }
}

/// SMAP exports occasionally carry percent rather than a fraction. Negative
/// values are the product's fill marker.
fn soil_moisture_to_fraction(value: f64) -> Option<f64> {
    if value < 0.0 {
        None
    } else if value > 1.0 {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one row's value fields into the reading shape of `source`.
pub fn decode(source: SourceId, fields: &BTreeMap<String, Value>) -> Result<SourceReading, String> {
    match source {
        SourceId::Era5 => decode_era5(fields),
        SourceId::Chirps => Ok(SourceReading::Chirps {
            precipitation_mm: field(fields, &["precipitation", "precipitation_chirps_mm"])?,
        }),
        SourceId::ModisLst => decode_modis_lst(fields),
        SourceId::ModisVi => decode_modis_vi(fields),
        SourceId::Smap => Ok(SourceReading::Smap {
            soil_moisture: field(fields, &["ssm", "soil_moisture"])?.and_then(soil_moisture_to_fraction),
        }),
    }
}

fn decode_era5(fields: &BTreeMap<String, Value>) -> Result<SourceReading, String> {
    let temperature_c = field(fields, &["temperature_2m", "temperature_era5_c"])?.map(to_celsius);

    // GEE publishes ERA5-Land precipitation in metres of water.
    let precipitation_mm = match field(fields, &["precipitation_era5_mm"])? {
        Some(mm) => Some(mm),
        None => field(fields, &["total_precipitation_sum", "precipitation_sum"])?.map(|m| m * 1000.0),
    };

    let solar_radiation_mj_m2 = match field(fields, &["solar_radiation_mj_m2"])? {
        Some(mj) => Some(mj),
        None => field(fields, &["surface_solar_radiation_downwards_sum", "solar_radiation"])?
            .map(|j| j / 1_000_000.0),
    };

    Ok(SourceReading::Era5 {
        temperature_c,
        precipitation_mm,
        solar_radiation_mj_m2,
        wind_u_ms: field(fields, &["u_component_of_wind_10m", "wind_u", "wind_u_ms"])?,
        wind_v_ms: field(fields, &["v_component_of_wind_10m", "wind_v", "wind_v_ms"])?,
    })
}

fn decode_modis_lst(fields: &BTreeMap<String, Value>) -> Result<SourceReading, String> {
    let day_c = match field(fields, &["temp_day_celsius", "temperature_day_modis_c"])? {
        Some(c) => Some(c),
        None => field(fields, &["lst_day_1km", "temp_day_kelvin"])?.map(modis_lst_to_celsius),
    };
    let night_c = match field(fields, &["temp_night_celsius", "temperature_night_modis_c"])? {
        Some(c) => Some(c),
        None => field(fields, &["lst_night_1km", "temp_night_kelvin"])?.map(modis_lst_to_celsius),
    };
    Ok(SourceReading::ModisLst { day_c, night_c })
}

fn decode_modis_vi(fields: &BTreeMap<String, Value>) -> Result<SourceReading, String> {
    let ndvi = match field(fields, &["ndvi_normalized"])? {
        Some(v) => Some(v),
        None => field(fields, &["ndvi"])?.map(modis_vi_to_unitless),
    };
    let evi = match field(fields, &["evi_normalized"])? {
        Some(v) => Some(v),
        None => field(fields, &["evi"])?.map(modis_vi_to_unitless),
    };
    Ok(SourceReading::ModisVi { ndvi, evi })
}

// ============================================================================
// Tests
// ============================================================================
