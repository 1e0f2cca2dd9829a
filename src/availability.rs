//! Data Availability Reporting
//!
//! Summarizes, per region and requested range, how much of each variable and
//! each source actually made it into the consolidated rows. Schedulers and
//! dashboards read this report instead of re-deriving coverage themselves.
//!
//! Staleness is measured against the end of the requested range, never the
//! wall clock, so a report is a pure function of the rows it describes.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{ConsolidatedRecord, DateRange, SourceId, Variable};
use crate::regions::Region;

/// Share of days with data at or above which a source counts as complete.
pub const COMPLETE_THRESHOLD: f64 = 0.9;

// ============================================================================
// Report types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityReport {
    pub region_id: String,
    pub region_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: usize,
    pub mean_completeness: f64,
    /// Column name -> fraction of rows where the value is present.
    pub variables: BTreeMap<String, f64>,
    pub sources: Vec<SourceAvailability>,
    pub summary: AvailabilitySummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceAvailability {
    pub source: SourceId,
    pub status: SourceStatus,
    /// Fraction of days with at least one of the source's variables.
    pub fraction_present: f64,
    pub days_with_data: usize,
    pub last_observed: Option<NaiveDate>,
    /// Days between `last_observed` and the end of the range.
    pub lag_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AvailabilitySummary {
    pub sources_complete: usize,
    pub sources_partial: usize,
    pub sources_missing: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceStatus {
    Complete,
    Partial,
    Missing,
}

impl SourceStatus {
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction >= COMPLETE_THRESHOLD {
            SourceStatus::Complete
        } else if fraction > 0.0 {
            SourceStatus::Partial
        } else {
            SourceStatus::Missing
        }
    }
}

// ============================================================================
// Building
// ============================================================================

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { count as f64 / total as f64 }
}

fn source_availability(source: SourceId, range: DateRange, records: &[ConsolidatedRecord]) -> SourceAvailability {
    let observed: Vec<NaiveDate> = records
        .iter()
        .filter(|r| source.variables().iter().any(|v| r.values.contains_key(v)))
        .map(|r| r.date)
        .collect();
    let fraction_present = fraction(observed.len(), records.len());
    let last_observed = observed.iter().max().copied();

    SourceAvailability {
        source,
        status: SourceStatus::from_fraction(fraction_present),
        fraction_present,
        days_with_data: observed.len(),
        last_observed,
        lag_days: last_observed.map(|d| (range.end() - d).num_days()),
    }
}

/// Build the report for one region's emitted rows over `range`.
pub fn build_report(region: &Region, range: DateRange, records: &[ConsolidatedRecord]) -> AvailabilityReport {
    let rows = records.len();

    let mut variables = BTreeMap::new();
    for variable in Variable::ALL {
        let present = records.iter().filter(|r| r.values.contains_key(&variable)).count();
        variables.insert(variable.column().to_string(), fraction(present, rows));
    }
    let mut derived_counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        for (column, value) in record.derived.numeric_columns() {
            *derived_counts.entry(column).or_default() += usize::from(value.is_some());
        }
    }
    for (column, present) in derived_counts {
        variables.insert(column, fraction(present, rows));
    }

    let sources: Vec<SourceAvailability> = SourceId::ALL
        .iter()
        .map(|s| source_availability(*s, range, records))
        .collect();

    let mut summary = AvailabilitySummary::default();
    for s in &sources {
        match s.status {
            SourceStatus::Complete => summary.sources_complete += 1,
            SourceStatus::Partial => summary.sources_partial += 1,
            SourceStatus::Missing => summary.sources_missing += 1,
        }
    }

    let mean_completeness = if rows == 0 {
        0.0
    } else {
        records.iter().map(|r| r.completeness_score).sum::<f64>() / rows as f64
    };

    AvailabilityReport {
        region_id: region.id.to_string(),
        region_name: region.name.to_string(),
        start: range.start(),
        end: range.end(),
        rows,
        mean_completeness,
        variables,
        sources,
        summary,
    }
}

// ============================================================================
// Console summary
// ============================================================================

pub fn print_summary(reports: &[AvailabilityReport]) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("DATA AVAILABILITY SUMMARY");
    println!("═══════════════════════════════════════════════════════════");

    for report in reports {
        println!();
        println!(
            "{} ({}..{}): {} rows, mean completeness {:.2}",
            report.region_name, report.start, report.end, report.rows, report.mean_completeness
        );
        for source in &report.sources {
            let last = source
                .last_observed
                .map(|d| format!("last {} (lag {}d)", d, source.lag_days.unwrap_or_default()))
                .unwrap_or_else(|| "never observed".to_string());
            match source.status {
                SourceStatus::Complete => {
                    println!("  ✓ {:<10} {:>5.1}%  {}", source.source, source.fraction_present * 100.0, last)
                }
                SourceStatus::Partial => {
                    println!("  ⚠ {:<10} {:>5.1}%  {}", source.source, source.fraction_present * 100.0, last)
                }
                SourceStatus::Missing => println!("  ✗ {:<10} no data", source.source),
            }
        }
    }

    let total: usize = reports.iter().map(|r| r.sources.len()).sum();
    let complete: usize = reports.iter().map(|r| r.summary.sources_complete).sum();
    println!();
    println!(
        "Complete source coverage: {:.1}% ({}/{})",
        fraction(complete, total) * 100.0,
        complete,
        total
    );
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
