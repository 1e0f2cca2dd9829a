/// Output rows.
///
/// A `ConsolidatedRecord` is persisted as one flat JSON object per line with
/// a fixed column order: identity and calendar columns, every raw variable
/// (null when absent), the derived columns, then the completeness score.
/// Serialization is deterministic, so identical records give identical bytes.

use std::io::{self, Write};

use chrono::Datelike;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::model::{ConsolidatedRecord, Variable};

/// Columns every row carries whatever the configuration, besides the raw
/// variable columns. Configured rolling and anomaly names may not reuse them.
pub const FIXED_COLUMNS: &[&str] = &[
    "region",
    "region_id",
    "date",
    "year",
    "month",
    "day",
    "day_of_year",
    "latitude",
    "longitude",
    "precipitation_mm",
    "growing_degree_days",
    "growing_degree_days_cycle",
    "drought_index",
    "wind_speed_ms",
    "wind_direction_deg",
    "temperature_amplitude_c",
    "vegetation_health_index",
    "consecutive_dry_days",
    "is_rainy_season",
    "is_dry_season",
    "season",
    "data_completeness_score",
];

/// Borrowing serializer view of one output row.
pub struct OutputRow<'a>(pub &'a ConsolidatedRecord);

impl Serialize for OutputRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let r = self.0;
        let d = &r.derived;
        let mut map = serializer.serialize_map(None)?;

        map.serialize_entry("region", r.region_name)?;
        map.serialize_entry("region_id", r.region_id)?;
        map.serialize_entry("date", &r.date.format("%Y-%m-%d").to_string())?;
        map.serialize_entry("year", &r.date.year())?;
        map.serialize_entry("month", &r.date.month())?;
        map.serialize_entry("day", &r.date.day())?;
        map.serialize_entry("day_of_year", &r.date.ordinal())?;
        map.serialize_entry("latitude", &r.latitude)?;
        map.serialize_entry("longitude", &r.longitude)?;

        for variable in Variable::ALL {
            map.serialize_entry(variable.column(), &r.get(variable))?;
        }

        for (column, value) in d.numeric_columns() {
            if column == "consecutive_dry_days" {
                map.serialize_entry(&column, &d.consecutive_dry_days)?;
            } else {
                map.serialize_entry(&column, &value)?;
            }
        }
        map.serialize_entry("is_rainy_season", &d.is_rainy_season)?;
        map.serialize_entry("is_dry_season", &!d.is_rainy_season)?;
        map.serialize_entry("season", &d.season.to_string())?;

        map.serialize_entry("data_completeness_score", &r.completeness_score)?;
        map.end()
    }
}

/// Serialize one row to a JSON object string.
pub fn to_json_line(record: &ConsolidatedRecord) -> serde_json::Result<String> {
    serde_json::to_string(&OutputRow(record))
}

/// Write rows as JSON lines, skipping rows scoring at or below `min_completeness`.
/// Returns the number of rows written.
pub fn write_json_lines<W: Write>(
    writer: &mut W,
    records: &[ConsolidatedRecord],
    min_completeness: Option<f64>,
) -> io::Result<usize> {
    let mut written = 0;
    for record in records {
        if min_completeness.is_some_and(|min| record.completeness_score <= min) {
            continue;
        }
        let line = to_json_line(record).map_err(io::Error::other)?;
        writeln!(writer, "{}", line)?;
        written += 1;
    }
    Ok(written)
}
