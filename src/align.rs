/// Temporal aligner.
///
/// Places one region's observations from every source onto a single
/// continuous daily axis. Every day of the range gets exactly one record,
/// even when no source reported anything for it. Source-specific variables
/// stay in their own slots; reconciliation between sources is left to the
/// feature engine.

use crate::logging::{self, LogSource};
use crate::model::{AlignedRecord, DateRange, RawObservation, RegionId};

/// Counters describing what the aligner did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignStats {
    /// Observations placed on the axis.
    pub placed: usize,
    /// Observations for another region or outside the range.
    pub ignored: usize,
    /// Values overwritten by a later observation for the same day and source.
    pub superseded: usize,
}

/// Align observations for `region_id` onto `range`.
///
/// Output is ordered by date ascending with no gaps and no duplicates. When
/// two observations of the same source land on the same day, the later one in
/// input order wins for every value it carries.
pub fn align(region_id: RegionId, range: DateRange, observations: &[RawObservation]) -> Vec<AlignedRecord> {
    align_with_stats(region_id, range, observations).0
}

pub fn align_with_stats(
    region_id: RegionId,
    range: DateRange,
    observations: &[RawObservation],
) -> (Vec<AlignedRecord>, AlignStats) {
    let mut records: Vec<AlignedRecord> = range
        .days()
        .map(|date| AlignedRecord::empty(region_id, date))
        .collect();
    let mut stats = AlignStats::default();
    let mut seen = std::collections::HashSet::new();

    for obs in observations {
        if obs.region_id != region_id || !range.contains(obs.date) {
            stats.ignored += 1;
            continue;
        }
        let index = (obs.date - range.start()).num_days() as usize;
        let record = &mut records[index];
        if !seen.insert((obs.date, obs.source)) {
            stats.superseded += 1;
        }
        for (variable, value) in obs.reading.values() {
            match value {
                Some(v) => {
                    record.values.insert(variable, v);
                }
                None => {
                    record.values.remove(&variable);
                }
            }
        }
        stats.placed += 1;
    }

    if stats.ignored > 0 || stats.superseded > 0 {
        logging::debug(
            LogSource::Aligner,
            Some(region_id),
            &format!(
                "{} observations placed, {} ignored, {} superseded over {}",
                stats.placed, stats.ignored, stats.superseded, range
            ),
        );
    }

    (records, stats)
}
