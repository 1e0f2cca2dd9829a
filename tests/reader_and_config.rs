/// Integration tests for the input boundary: batch files, row rejection
/// accounting, and configuration loading from disk.

use std::io::Write;

use agroclim_service::config::{load_config, ConfigError, EngineConfig, RollingStat};
use agroclim_service::ingest::reader::{read_batches, RawBatch};
use agroclim_service::model::{RowError, SourceId, SourceReading, Variable};
use agroclim_service::Consolidator;

use chrono::NaiveDate;
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

const BATCH_FILE: &str = r#"[
  {
    "source": "era5",
    "rows": [
      {"region_name": "Thiès", "date": "2024-06-01", "temperature_2m": 299.15, "total_precipitation_sum": 0.0},
      {"region_name": "Thies", "date": "2024-06-02T00:00:00", "temperature_2m": 300.15},
      {"region_name": "Thiès", "date": "June 3rd", "temperature_2m": 301.15},
      {"region_name": "Nowhere", "date": "2024-06-01", "temperature_2m": 299.15}
    ]
  },
  {
    "source": "modis_vi",
    "rows": [
      {"region": "THIES", "date": "2024-06-01", "NDVI": 3300, "EVI": "n/a"},
      {"region": "THIES", "date": "2024-06-02", "NDVI": 3400, "EVI": null}
    ]
  }
]"#;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[test]
fn test_batch_file_rejections_are_counted_not_fatal() {
    let batches: Vec<RawBatch> = serde_json::from_str(BATCH_FILE).unwrap();
    let outcome = read_batches(&batches);

    assert_eq!(outcome.stats.total, 6);
    assert_eq!(outcome.stats.accepted, 3);
    assert_eq!(outcome.stats.unknown_region, 1);
    assert_eq!(outcome.stats.malformed, 2);
    assert_eq!(outcome.stats.superseded, 0);
    assert!(outcome
        .rejected
        .contains(&RowError::UnknownRegion("Nowhere".to_string())));

    let vi: Vec<_> = outcome
        .observations
        .iter()
        .filter(|o| o.source == SourceId::ModisVi)
        .collect();
    assert_eq!(vi.len(), 1);
    assert!(matches!(vi[0].reading, SourceReading::ModisVi { evi: None, .. }));
}

#[test]
fn test_unknown_source_fails_batch_parsing() {
    let result: Result<Vec<RawBatch>, _> = serde_json::from_str(r#"[{"source": "landsat", "rows": []}]"#);
    assert!(result.is_err());
}

#[test]
fn test_batch_file_consolidates_with_rejected_rows_dropped() {
    let batches: Vec<RawBatch> = serde_json::from_str(BATCH_FILE).unwrap();
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let outcome = Consolidator::new(EngineConfig::default()).consolidate_regions(&batches, start, end, None);

    assert_eq!(outcome.results.len(), 1);
    let (name, result) = &outcome.results[0];
    assert_eq!(name, "thies");
    let records = &result.as_ref().unwrap().records;
    assert_eq!(records.len(), 3);
    assert!(records[2].values.is_empty());
    assert_eq!(records[0].derived.growing_degree_days.map(|g| g.round()), Some(16.0));
}

#[test]
fn test_bad_rows_in_file_are_rejected_without_failing_other_regions() {
    let file = r#"[
      {
        "source": "chirps",
        "rows": [
          {"region_name": "Kolda", "date": "2024-06-01", "precipitation": 4.0},
          {"region_name": null, "date": "2024-06-01", "precipitation": 1.0},
          {"region_name": 42, "date": "2024-06-01", "precipitation": 1.0},
          {"region_name": "Kolda", "date": "2024-06-02", "precipitation": "inf"},
          [1, 2, 3]
        ]
      }
    ]"#;
    let batches: Vec<RawBatch> = serde_json::from_str(file).expect("bad rows must not fail the file");
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
    let outcome = Consolidator::new(EngineConfig::default()).consolidate_regions(&batches, start, end, None);

    assert_eq!(outcome.read_stats.total, 5);
    assert_eq!(outcome.read_stats.accepted, 1);
    assert_eq!(outcome.read_stats.unknown_region, 1);
    assert_eq!(outcome.read_stats.malformed, 3);

    assert_eq!(outcome.results.len(), 1);
    let records = &outcome.results[0].1.as_ref().unwrap().records;
    assert_eq!(records[0].get(Variable::PrecipitationChirpsMm), Some(4.0));
    // The "inf" day is absent, so it neither scores nor reports as present.
    assert!(records[1].values.is_empty());
    assert_eq!(records[1].completeness_score, 0.0);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_load_config_from_file() {
    let file = write_temp(
        r#"
        dry_day_threshold_mm = 1.0

        [growing_degree_days]
        base_temperature_c = 8.0
        cycle_start_month = 5
        cycle_start_day = 15

        [[rolling]]
        name = "precipitation_cumulative_10d"
        input = "precipitation_mm"
        window = 10
        min_valid = 8
        stat = "sum"

        [[anomaly]]
        name = "precipitation_anomaly"
        input = "precipitation_cumulative_10d"
        [[anomaly]]
        name = "temperature_anomaly"
        input = "temperature_era5_c"
        [[anomaly]]
        name = "soil_moisture_anomaly"
        input = "soil_moisture"

        [completeness]
        sparse_weight = 0.2
        "#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.growing_degree_days.base_temperature_c, 8.0);
    assert_eq!(config.growing_degree_days.cycle_start_month, 5);
    assert_eq!(config.rolling.len(), 1);
    assert_eq!(config.rolling[0].stat, RollingStat::Sum);
    assert_eq!(config.completeness.sparse_weight, 0.2);
    assert_eq!(config.completeness.high_weight, 0.7);
    assert_eq!(config.dry_day_threshold_mm, 1.0);
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let file = write_temp("[drought]\nclip = 0.0\n");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Invalid(_))));

    let file = write_temp("[limits\nmax_history_days = 10\n");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
}
