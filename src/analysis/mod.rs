/// Per-record scoring and derived-feature computation.
///
/// Submodules:
/// - `completeness` scores each aligned record by reliability-weighted coverage.
/// - `rolling` computes trailing N-day means and sums over the daily axis.
/// - `climatology` builds day-of-year baselines and standardized anomalies.
/// - `features` combines the above into the per-day derived variables.

pub mod climatology;
pub mod completeness;
pub mod features;
pub mod rolling;
