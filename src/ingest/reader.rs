/// Source reader: raw extractor rows -> validated `RawObservation`s.
///
/// Input rows are loose JSON objects of the form
/// `{"region_name": "...", "date": "YYYY-MM-DD", <band>: <value>, ...}`.
/// The reader resolves the region against the registry, parses the date,
/// decodes the value fields into the source's fixed reading shape and
/// de-duplicates on `(region, source, date)`.
///
/// Nothing here is fatal: rows with an unknown region or a malformed date or
/// value are dropped and counted.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::sources;
use crate::logging::{self, LogSource};
use crate::model::{RawObservation, RegionId, RowError, SourceId};
use crate::regions;

// ============================================================================
// Input shapes
// ============================================================================

/// One row as delivered by the extractor.
///
/// Deserializing a row never fails: any JSON value becomes a `RawRow`, and
/// shape problems surface later as rejected rows. A single bad row therefore
/// cannot fail the batch it arrives in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct RawRow {
    /// `region_name` (or `region`) as delivered. Only strings can resolve.
    pub region_name: Value,
    /// ISO date string, or epoch milliseconds as published by GEE.
    pub date: Value,
    /// Band name -> value. Unrecognized bands are ignored by the decoder.
    pub fields: BTreeMap<String, Value>,
    /// Set when the delivered row was not a JSON object.
    not_an_object: Option<String>,
}

impl From<Value> for RawRow {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let mut fields: BTreeMap<String, Value> = map.into_iter().collect();
                let primary = fields.remove("region_name");
                let alias = fields.remove("region");
                Self {
                    region_name: primary.or(alias).unwrap_or(Value::Null),
                    date: fields.remove("date").unwrap_or(Value::Null),
                    fields,
                    not_an_object: None,
                }
            }
            other => Self {
                region_name: Value::Null,
                date: Value::Null,
                fields: BTreeMap::new(),
                not_an_object: Some(format!("row is not an object: {}", other)),
            },
        }
    }
}

/// One extract: rows of a single source, usually for one region and window.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBatch {
    pub source: SourceId,
    pub rows: Vec<RawRow>,
}

// ============================================================================
// Read results
// ============================================================================

/// Row counts for one reader invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    pub total: usize,
    pub accepted: usize,
    pub unknown_region: usize,
    pub malformed: usize,
    pub superseded: usize,
}

impl ReadStats {
    pub fn merge(&mut self, other: &ReadStats) {
        self.total += other.total;
        self.accepted += other.accepted;
        self.unknown_region += other.unknown_region;
        self.malformed += other.malformed;
        self.superseded += other.superseded;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOutcome {
    /// Observations ordered by `(region, source, date)`, unique on that key.
    pub observations: Vec<RawObservation>,
    pub stats: ReadStats,
    pub rejected: Vec<RowError>,
}

impl ReadOutcome {
    /// Observations belonging to one region.
    pub fn for_region(&self, region_id: &str) -> Vec<RawObservation> {
        self.observations
            .iter()
            .filter(|o| o.region_id == region_id)
            .cloned()
            .collect()
    }

    /// Distinct regions that contributed at least one observation.
    pub fn regions(&self) -> Vec<RegionId> {
        let mut ids: Vec<RegionId> = self.observations.iter().map(|o| o.region_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Parse a row date. Accepts `YYYY-MM-DD`, a datetime whose first ten
/// characters are such a date, or integer epoch milliseconds.
pub fn parse_row_date(value: &Value) -> Result<NaiveDate, String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Ok(date);
            }
            let prefix = s.get(..10).filter(|_| matches!(s.as_bytes().get(10), Some(b'T' | b' ')));
            prefix
                .and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok())
                .ok_or_else(|| format!("unparseable date '{}'", s))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| format!("unparseable epoch date {}", n)),
        Value::Null => Err("missing date".to_string()),
        other => Err(format!("unsupported date value {}", other)),
    }
}

fn read_rows(
    source: SourceId,
    rows: &[RawRow],
    into: &mut BTreeMap<(RegionId, NaiveDate), RawObservation>,
    rejected: &mut Vec<RowError>,
) -> ReadStats {
    let mut stats = ReadStats {
        total: rows.len(),
        ..ReadStats::default()
    };

    for (index, row) in rows.iter().enumerate() {
        if let Some(reason) = &row.not_an_object {
            let err = RowError::MalformedRow { row: index, reason: reason.clone() };
            logging::debug(LogSource::Feed(source), None, &err.to_string());
            stats.malformed += 1;
            rejected.push(err);
            continue;
        }

        let region = match &row.region_name {
            Value::String(name) => regions::find_region(name).ok_or_else(|| RowError::UnknownRegion(name.clone())),
            Value::Null => Err(RowError::UnknownRegion(String::new())),
            other => Err(RowError::MalformedRow {
                row: index,
                reason: format!("region_name is not a string: {}", other),
            }),
        };
        let region = match region {
            Ok(region) => region,
            Err(err) => {
                if matches!(err, RowError::UnknownRegion(_)) {
                    stats.unknown_region += 1;
                } else {
                    logging::debug(LogSource::Feed(source), None, &err.to_string());
                    stats.malformed += 1;
                }
                rejected.push(err);
                continue;
            }
        };

        let parsed = parse_row_date(&row.date)
            .and_then(|date| sources::decode(source, &row.fields).map(|reading| (date, reading)));
        let (date, reading) = match parsed {
            Ok(ok) => ok,
            Err(reason) => {
                let err = RowError::MalformedRow { row: index, reason };
                logging::debug(LogSource::Feed(source), Some(region.id), &err.to_string());
                stats.malformed += 1;
                rejected.push(err);
                continue;
            }
        };

        let observation = RawObservation {
            region_id: region.id,
            source,
            date,
            reading,
        };
        if into.insert((region.id, date), observation).is_some() {
            stats.superseded += 1;
        }
    }

    stats
}

/// Read one source's rows. A duplicate `(region, date)` replaces the earlier
/// row and is counted as superseded.
pub fn read_source(source: SourceId, rows: &[RawRow]) -> ReadOutcome {
    let mut by_key = BTreeMap::new();
    let mut rejected = Vec::new();
    let mut stats = read_rows(source, rows, &mut by_key, &mut rejected);
    stats.accepted = by_key.len();

    logging::log_reader_summary(
        source,
        stats.total,
        stats.accepted,
        stats.unknown_region,
        stats.malformed,
        stats.superseded,
    );

    ReadOutcome {
        observations: by_key.into_values().collect(),
        stats,
        rejected,
    }
}

/// Read several batches in order. Batches of the same source share one
/// de-duplication scope, so a later batch supersedes an earlier one.
pub fn read_batches(batches: &[RawBatch]) -> ReadOutcome {
    let mut per_source: BTreeMap<SourceId, BTreeMap<(RegionId, NaiveDate), RawObservation>> =
        BTreeMap::new();
    let mut per_source_stats: BTreeMap<SourceId, ReadStats> = BTreeMap::new();
    let mut rejected = Vec::new();

    for batch in batches {
        let scope = per_source.entry(batch.source).or_default();
        let stats = read_rows(batch.source, &batch.rows, scope, &mut rejected);
        per_source_stats.entry(batch.source).or_default().merge(&stats);
    }

    let mut outcome = ReadOutcome {
        rejected,
        ..ReadOutcome::default()
    };
    for (source, scope) in per_source {
        let mut stats = per_source_stats.remove(&source).unwrap_or_default();
        stats.accepted = scope.len();
        logging::log_reader_summary(
            source,
            stats.total,
            stats.accepted,
            stats.unknown_region,
            stats.malformed,
            stats.superseded,
        );
        outcome.stats.merge(&stats);
        outcome.observations.extend(scope.into_values());
    }
    outcome
        .observations
        .sort_by(|a, b| (a.region_id, a.source, a.date).cmp(&(b.region_id, b.source, b.date)));
    outcome
}

// ============================================================================
// Tests
// ============================================================================
