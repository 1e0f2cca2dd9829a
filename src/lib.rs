//! Regional agro-climate consolidation service.
//!
//! Merges daily per-region observations from ERA5-Land, CHIRPS, MODIS and
//! SMAP onto one gap-aware daily axis, derives agronomic indicators and
//! scores every row for completeness.
//!
//! Pipeline, leaves first:
//! - `regions`: static region registry
//! - `ingest`: source decoding and the row reader
//! - `align`: per-region daily axis
//! - `analysis`: completeness, rolling windows, climatology, derived features
//! - `consolidate`: single-region and parallel multi-region entry points
//! - `availability`, `output`: coverage report and persisted row shape

pub mod align;
pub mod analysis;
pub mod availability;
pub mod config;
pub mod consolidate;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;
pub mod regions;

pub use config::EngineConfig;
pub use consolidate::{Consolidation, Consolidator, RunOutcome};
pub use model::{ConsolidatedRecord, DateRange, RegionPipelineError};
