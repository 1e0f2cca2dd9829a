/// Consolidation writer: the public entry point of the engine.
///
/// `Consolidator::consolidate` runs read -> align -> score -> derive for one
/// region and returns either the complete row set for the requested range or
/// a region-scoped error. Partial row sets are never returned.
///
/// The aligned axis covers the requested range plus every date the region has
/// observations for within `limits.max_history_days` ending on the range end,
/// so rolling windows, growing cycles and climatology baselines see the
/// region's history. Only rows inside the requested range are emitted.
///
/// Regions share nothing mutable, so `consolidate_regions` runs them on the
/// rayon pool without locks.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rayon::prelude::*;

use crate::align::align_with_stats;
use crate::analysis::completeness::score_records;
use crate::analysis::features::compute_features;
use crate::availability::{build_report, AvailabilityReport};
use crate::config::EngineConfig;
use crate::ingest::reader::{read_batches, RawBatch, ReadStats};
use crate::logging::{self, LogSource};
use crate::model::{
    ConsolidatedRecord, DateRange, PipelineFailure, QualityEvent, RawObservation, RegionId,
    RegionPipelineError,
};
use crate::regions;

/// Result of one successful region run.
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub region_id: RegionId,
    pub range: DateRange,
    /// One record per day of `range`, ascending.
    pub records: Vec<ConsolidatedRecord>,
    pub report: AvailabilityReport,
    /// Nulled values inside `range`, ordered by date then feature.
    pub quality_events: Vec<QualityEvent>,
    /// Days of history the features were computed over.
    pub history_days: usize,
    /// Region observations outside the history window, left out of the run.
    pub dropped_observations: usize,
}

/// Result of a multi-region run.
#[derive(Debug)]
pub struct RunOutcome {
    /// `(requested region name, result)`, sorted by region name.
    pub results: Vec<(String, Result<Consolidation, RegionPipelineError>)>,
    pub read_stats: ReadStats,
}

impl RunOutcome {
    pub fn succeeded(&self) -> impl Iterator<Item = &Consolidation> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RegionPipelineError> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().err())
    }

    /// True when regions were requested and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.succeeded().next().is_none()
    }
}

pub struct Consolidator {
    config: EngineConfig,
}

impl Consolidator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consolidate one region over `[start, end]`.
    ///
    /// `observations` may contain other regions' rows; they are ignored.
    /// Re-running with the same inputs yields identical output.
    pub fn consolidate(
        &self,
        region_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        observations: &[RawObservation],
    ) -> Result<Consolidation, RegionPipelineError> {
        let fail = |kind: PipelineFailure| RegionPipelineError {
            region: region_name.to_string(),
            start,
            end,
            kind,
        };

        let region = regions::find_region(region_name).ok_or_else(|| fail(PipelineFailure::UnknownRegion))?;
        let range = DateRange::new(start, end).ok_or_else(|| fail(PipelineFailure::InvertedRange { start, end }))?;

        let limit = self.config.limits.max_history_days;
        if range.num_days() > limit {
            return Err(fail(PipelineFailure::RangeTooLong {
                days: range.num_days(),
                limit,
            }));
        }

        // History is the `limit` days ending at `end`. Observations outside
        // it (stray years, dates past the range) are dropped, not fatal.
        let earliest = end
            .checked_sub_days(Days::new(limit as u64 - 1))
            .unwrap_or(NaiveDate::MIN);
        let window = range.extended_to(earliest);
        let (own, outside): (Vec<RawObservation>, Vec<RawObservation>) = observations
            .iter()
            .filter(|o| o.region_id == region.id)
            .cloned()
            .partition(|o| window.contains(o.date));
        if !outside.is_empty() {
            logging::debug(
                LogSource::Engine,
                Some(region.id),
                &format!(
                    "{} observations outside the history window {} dropped",
                    outside.len(),
                    window
                ),
            );
        }
        let history = own.iter().fold(range, |h, o| h.extended_to(o.date));

        let (aligned, align_stats) = align_with_stats(region.id, history, &own);
        let derived = compute_features(region, &aligned, &self.config);
        let scores = score_records(&aligned, &self.config.completeness);

        let records: Vec<ConsolidatedRecord> = aligned
            .into_iter()
            .zip(derived.features)
            .zip(scores)
            .filter(|((record, _), _)| range.contains(record.date))
            .map(|((record, features), score)| ConsolidatedRecord {
                region_id: region.id,
                region_name: region.name,
                latitude: region.latitude,
                longitude: region.longitude,
                date: record.date,
                values: record.values,
                derived: features,
                completeness_score: score,
            })
            .collect();

        let quality_events: Vec<QualityEvent> = derived
            .events
            .into_iter()
            .filter(|e| range.contains(e.date))
            .collect();
        for event in &quality_events {
            logging::log_quality_event(region.id, event);
        }
        logging::log_quality_summary(region.id, &quality_events);

        let report = build_report(region, range, &records);
        logging::info(
            LogSource::Engine,
            Some(region.id),
            &format!(
                "Consolidated {} rows over {} ({} days of history, {} observations, mean completeness {:.2})",
                records.len(),
                range,
                history.num_days(),
                align_stats.placed,
                report.mean_completeness
            ),
        );

        Ok(Consolidation {
            region_id: region.id,
            range,
            records,
            report,
            quality_events,
            history_days: history.num_days(),
            dropped_observations: outside.len(),
        })
    }

    /// Consolidate one region straight from raw batches.
    pub fn consolidate_batches(
        &self,
        region_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        batches: &[RawBatch],
    ) -> (Result<Consolidation, RegionPipelineError>, ReadStats) {
        let read = read_batches(batches);
        (self.consolidate(region_name, start, end, &read.observations), read.stats)
    }

    /// Read every batch once, then consolidate each region in parallel.
    ///
    /// With no explicit `only` list, every region present in the batches is
    /// run. A failing region produces an `Err` entry and does not affect the
    /// others.
    pub fn consolidate_regions(
        &self,
        batches: &[RawBatch],
        start: NaiveDate,
        end: NaiveDate,
        only: Option<&[String]>,
    ) -> RunOutcome {
        let read = read_batches(batches);

        let mut by_region: BTreeMap<RegionId, Vec<RawObservation>> = BTreeMap::new();
        for obs in read.observations {
            by_region.entry(obs.region_id).or_default().push(obs);
        }

        let requested: Vec<String> = match only {
            Some(names) => names.to_vec(),
            None => by_region.keys().map(|id| id.to_string()).collect(),
        };

        let mut results: Vec<(String, Result<Consolidation, RegionPipelineError>)> = requested
            .par_iter()
            .map(|name| {
                let observations = regions::find_region(name)
                    .and_then(|r| by_region.get(r.id))
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let result = self.consolidate(name, start, end, observations);
                if let Err(err) = &result {
                    logging::error(LogSource::Engine, Some(name.as_str()), &err.to_string());
                }
                (name.clone(), result)
            })
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));

        RunOutcome {
            results,
            read_stats: read.stats,
        }
    }
}
