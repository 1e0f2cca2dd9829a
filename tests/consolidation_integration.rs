/// End-to-end consolidation tests: raw JSON batches in, consolidated rows out.
///
/// These exercise the whole pipeline (reader, aligner, scorer, feature
/// engine, writer) through the public API only. No network or files needed.

use agroclim_service::analysis::climatology::climatology_day;
use agroclim_service::config::EngineConfig;
use agroclim_service::ingest::reader::RawBatch;
use agroclim_service::model::{FeatureError, PipelineFailure, SourceId, Variable};
use agroclim_service::output;
use agroclim_service::Consolidator;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn batch(source: &str, rows: Vec<Value>) -> RawBatch {
    serde_json::from_value(json!({ "source": source, "rows": rows })).unwrap()
}

fn consolidator() -> Consolidator {
    Consolidator::new(EngineConfig::default())
}

// ---------------------------------------------------------------------------
// Axis and score properties
// ---------------------------------------------------------------------------

#[test]
fn test_one_row_per_day_ascending_without_duplicates() {
    let batches = vec![batch(
        "chirps",
        vec![
            json!({"region_name": "Kaolack", "date": "2024-06-03", "precipitation": 2.0}),
            json!({"region_name": "Kaolack", "date": "2024-06-03", "precipitation": 4.0}),
            json!({"region_name": "Kaolack", "date": "2024-06-20", "precipitation": 0.0}),
        ],
    )];
    let (result, stats) = consolidator().consolidate_batches("Kaolack", day(2024, 6, 1), day(2024, 6, 30), &batches);
    let out = result.unwrap();

    assert_eq!(stats.superseded, 1);
    assert_eq!(out.records.len(), 30);
    assert!(out.records.windows(2).all(|w| (w[1].date - w[0].date).num_days() == 1));
    assert_eq!(out.records[2].get(Variable::PrecipitationChirpsMm), Some(4.0));
}

#[test]
fn test_completeness_scores_stay_in_unit_interval() {
    let mut rows = Vec::new();
    for d in 1..=20 {
        let kelvin = 300.0 + d as f64;
        let precipitation = if d % 3 == 0 { Value::Null } else { json!(0.001) };
        rows.push(json!({
            "region_name": "Louga",
            "date": format!("2024-03-{:02}", d),
            "temperature_2m": kelvin,
            "total_precipitation_sum": precipitation,
            "surface_solar_radiation_downwards_sum": 2.0e7,
            "u_component_of_wind_10m": 2.0,
            "v_component_of_wind_10m": 1.0
        }));
    }
    let batches = vec![
        batch("era5", rows),
        batch("smap", vec![json!({"region_name": "Louga", "date": "2024-03-05", "ssm": 0.12})]),
    ];
    let (result, _) = consolidator().consolidate_batches("louga", day(2024, 3, 1), day(2024, 3, 25), &batches);
    let out = result.unwrap();

    for record in &out.records {
        assert!((0.0..=1.0).contains(&record.completeness_score), "{}", record.completeness_score);
    }
    assert_eq!(out.records[24].completeness_score, 0.0);
}

#[test]
fn test_every_variable_present_scores_one() {
    let batches = vec![
        batch("era5", vec![json!({
            "region_name": "Fatick", "date": "2024-07-01",
            "temperature_2m": 301.0, "total_precipitation_sum": 0.002,
            "surface_solar_radiation_downwards_sum": 1.9e7,
            "u_component_of_wind_10m": 1.0, "v_component_of_wind_10m": 1.0
        })]),
        batch("chirps", vec![json!({"region_name": "Fatick", "date": "2024-07-01", "precipitation": 3.0})]),
        batch("modis_lst", vec![json!({"region_name": "Fatick", "date": "2024-07-01", "LST_Day_1km": 15500, "LST_Night_1km": 14900})]),
        batch("modis_vi", vec![json!({"region_name": "Fatick", "date": "2024-07-01", "NDVI": 5200, "EVI": 3100})]),
        batch("smap", vec![json!({"region_name": "Fatick", "date": "2024-07-01", "ssm": 0.25})]),
    ];
    let (result, _) = consolidator().consolidate_batches("fatick", day(2024, 7, 1), day(2024, 7, 1), &batches);
    let record = &result.unwrap().records[0];
    assert_relative_eq!(record.completeness_score, 1.0, epsilon = 1e-12);
    assert_relative_eq!(record.derived.vegetation_health_index.unwrap(), 0.415, epsilon = 1e-9);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_cross_source_fill() {
    let batches = vec![
        batch("era5", vec![json!({"region_name": "Dakar", "date": "2024-06-01", "temperature_2m": 301.15})]),
        batch("chirps", vec![json!({"region_name": "Dakar", "date": "2024-06-01", "precipitation": 6.5})]),
    ];
    let (result, _) = consolidator().consolidate_batches("Dakar", day(2024, 6, 1), day(2024, 6, 1), &batches);
    let record = &result.unwrap().records[0];

    assert_relative_eq!(record.get(Variable::TemperatureEra5C).unwrap(), 28.0, epsilon = 1e-9);
    assert_eq!(record.get(Variable::PrecipitationChirpsMm), Some(6.5));
    assert_eq!(record.derived.precipitation_mm, Some(6.5));
    // Present: ERA5 temperature (1.0) + CHIRPS (0.7) of 5 x 1.0 + 0.7 + 5 x 0.3.
    assert_relative_eq!(record.completeness_score, 1.7 / 7.2, epsilon = 1e-12);
}

#[test]
fn test_seven_day_sum_with_three_missing_days_is_null() {
    let rows: Vec<Value> = [1, 2, 4, 6]
        .iter()
        .map(|d| json!({"region_name": "Kolda", "date": format!("2024-07-{:02}", d), "precipitation": 10.0}))
        .collect();
    let (result, _) =
        consolidator().consolidate_batches("Kolda", day(2024, 7, 1), day(2024, 7, 7), &[batch("chirps", rows)]);
    let out = result.unwrap();

    let last = &out.records[6];
    assert_eq!(last.derived.rolling["precipitation_cumulative_7d"], None);
    assert_eq!(out.report.variables["precipitation_cumulative_7d"], 0.0);
}

#[test]
fn test_sensor_fault_temperature_nulls_only_that_days_gdd() {
    let rows = vec![
        json!({"region_name": "Matam", "date": "2024-04-01", "temperature_2m": 308.15}),
        json!({"region_name": "Matam", "date": "2024-04-02", "temperature_era5_c": 1000.0}),
        json!({"region_name": "Matam", "date": "2024-04-03", "temperature_2m": 306.15}),
    ];
    let (result, _) =
        consolidator().consolidate_batches("Matam", day(2024, 4, 1), day(2024, 4, 3), &[batch("era5", rows)]);
    let out = result.unwrap();

    assert_relative_eq!(out.records[0].derived.growing_degree_days.unwrap(), 25.0, epsilon = 1e-9);
    assert_eq!(out.records[1].derived.growing_degree_days, None);
    assert_relative_eq!(out.records[2].derived.growing_degree_days.unwrap(), 23.0, epsilon = 1e-9);

    let event = out
        .quality_events
        .iter()
        .find(|e| e.feature == "growing_degree_days")
        .expect("the faulty day should carry a reason");
    assert_eq!(event.date, day(2024, 4, 2));
    assert!(matches!(event.reason, FeatureError::OutOfRange { .. }));
}

#[test]
fn test_anomaly_is_zero_at_baseline_mean_and_null_without_history() {
    let rows: Vec<Value> = [(2021, 0.1), (2022, 0.2), (2023, 0.3), (2024, 0.2)]
        .iter()
        .map(|(y, v)| json!({"region_name": "Tambacounda", "date": format!("{}-07-01", y), "ssm": v}))
        .collect();
    let batches = vec![batch("smap", rows)];

    let (result, _) = consolidator().consolidate_batches("Tambacounda", day(2024, 7, 1), day(2024, 7, 1), &batches);
    let record = &result.unwrap().records[0];
    assert_relative_eq!(
        record.derived.anomalies["soil_moisture_anomaly"].unwrap(),
        0.0,
        epsilon = 1e-9
    );

    let short = vec![batch(
        "smap",
        vec![json!({"region_name": "Tambacounda", "date": "2024-07-01", "ssm": 0.2})],
    )];
    let (result, _) = consolidator().consolidate_batches("Tambacounda", day(2024, 7, 1), day(2024, 7, 1), &short);
    let out = result.unwrap();
    assert_eq!(out.records[0].derived.anomalies["soil_moisture_anomaly"], None);
    assert!(out.quality_events.iter().any(|e| matches!(
        &e.reason,
        FeatureError::IncompleteBaseline { day_of_year, .. } if *day_of_year == climatology_day(day(2024, 7, 1))
    )));
}

#[test]
fn test_rerun_is_byte_identical() {
    let mut rows = Vec::new();
    for d in 1..=31 {
        let mm = (d * 7 % 11) as f64;
        rows.push(json!({
            "region_name": "Ziguinchor",
            "date": format!("2024-08-{:02}", d),
            "precipitation": mm
        }));
    }
    let batches = vec![
        batch("chirps", rows),
        batch("modis_vi", vec![json!({"region_name": "Ziguinchor", "date": "2024-08-13", "NDVI": 6100, "EVI": 4000})]),
    ];

    let render = || {
        let (result, _) = consolidator().consolidate_batches("ziguinchor", day(2024, 8, 1), day(2024, 8, 31), &batches);
        let mut bytes = Vec::new();
        output::write_json_lines(&mut bytes, &result.unwrap().records, None).unwrap();
        bytes
    };
    let first = render();
    assert!(!first.is_empty());
    assert_eq!(first, render());
}

// ---------------------------------------------------------------------------
// Multi-region runs
// ---------------------------------------------------------------------------

#[test]
fn test_multi_region_run_routes_rows_and_isolates_failures() {
    let batches = vec![batch(
        "chirps",
        vec![
            json!({"region_name": "Dakar", "date": "2024-06-01", "precipitation": 1.0}),
            json!({"region_name": "Diourbel", "date": "2024-06-01", "precipitation": 2.0}),
            json!({"region_name": "Atlantis", "date": "2024-06-01", "precipitation": 3.0}),
        ],
    )];

    let outcome = consolidator().consolidate_regions(&batches, day(2024, 6, 1), day(2024, 6, 2), None);
    assert_eq!(outcome.read_stats.unknown_region, 1);
    assert_eq!(outcome.results.len(), 2);
    for consolidation in outcome.succeeded() {
        assert_eq!(consolidation.records.len(), 2);
        let expected = if consolidation.region_id == "dakar" { 1.0 } else { 2.0 };
        assert_eq!(consolidation.records[0].derived.precipitation_mm, Some(expected));
    }

    let inverted = consolidator().consolidate_regions(&batches, day(2024, 6, 2), day(2024, 6, 1), None);
    assert!(inverted.all_failed());
    for err in inverted.failed() {
        assert!(matches!(err.kind, PipelineFailure::InvertedRange { .. }));
    }
}

#[test]
fn test_stray_century_old_row_does_not_fail_the_region() {
    let batches = vec![batch(
        "chirps",
        vec![
            json!({"region_name": "Dakar", "date": "2024-06-01", "precipitation": 3.0}),
            json!({"region_name": "Dakar", "date": "1900-01-01", "precipitation": 9.0}),
        ],
    )];
    let (result, stats) = consolidator().consolidate_batches("dakar", day(2024, 6, 1), day(2024, 6, 2), &batches);
    assert_eq!(stats.accepted, 2);

    let out = result.expect("an out-of-window row is dropped, not fatal");
    assert_eq!(out.dropped_observations, 1);
    assert_eq!(out.history_days, 2);
    assert_eq!(out.records[0].derived.precipitation_mm, Some(3.0));
}

#[test]
fn test_report_lists_every_source() {
    let batches = vec![batch(
        "chirps",
        vec![json!({"region_name": "Sédhiou", "date": "2024-06-01", "precipitation": 0.0})],
    )];
    let (result, _) = consolidator().consolidate_batches("Sedhiou", day(2024, 6, 1), day(2024, 6, 10), &batches);
    let report = result.unwrap().report;
    assert_eq!(report.sources.len(), SourceId::ALL.len());
    assert_eq!(report.rows, 10);
    assert_relative_eq!(report.variables["precipitation_chirps_mm"], 0.1, epsilon = 1e-12);
}
