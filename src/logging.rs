/// Structured logging for the consolidation engine
///
/// Every message carries the component or source it concerns and, where
/// relevant, the region identifier. Messages go through the `log` facade;
/// the binary installs an `env_logger` backend writing to the console or to
/// a log file for scheduled runs.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

use log::LevelFilter;

use crate::model::{FeatureError, QualityEvent, SourceId};

// ---------------------------------------------------------------------------
// Log Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// A specific upstream data feed.
    Feed(SourceId),
    Aligner,
    Features,
    Engine,
    Config,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Feed(source) => write!(f, "{}", source),
            LogSource::Aligner => write!(f, "ALIGN"),
            LogSource::Features => write!(f, "FEAT"),
            LogSource::Engine => write!(f, "ENGINE"),
            LogSource::Config => write!(f, "CONFIG"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected gap - sparse source, short history, cloud cover
    Expected,
    /// Unexpected value - indicates a sensor fault or an upstream unit error
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

/// Classify the reason a derived value was nulled.
pub fn classify_feature_error(err: &FeatureError) -> FailureType {
    match err {
        FeatureError::IncompleteBaseline { .. } => FailureType::Expected,
        FeatureError::OutOfRange { .. } | FeatureError::NonFinite { .. } => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Logger Setup
// ---------------------------------------------------------------------------

/// Install the global logger.
///
/// `RUST_LOG` still overrides `min_level` per module when set. With a
/// `log_file`, entries are appended to that file instead of stderr.
pub fn init_logger(min_level: LevelFilter, log_file: Option<&str>) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(min_level);
    builder.parse_default_env();
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {}",
            buf.timestamp_seconds(),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    // A second initialisation (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

fn format_entry(source: LogSource, region: Option<&str>, message: &str) -> String {
    match region {
        Some(region) => format!("{} [{}]: {}", source, region, message),
        None => format!("{}: {}", source, message),
    }
}

/// Log a general informational message
pub fn info(source: LogSource, region: Option<&str>, message: &str) {
    log::info!("{}", format_entry(source, region, message));
}

/// Log a warning message
pub fn warn(source: LogSource, region: Option<&str>, message: &str) {
    log::warn!("{}", format_entry(source, region, message));
}

/// Log an error message
pub fn error(source: LogSource, region: Option<&str>, message: &str) {
    log::error!("{}", format_entry(source, region, message));
}

/// Log a debug message
pub fn debug(source: LogSource, region: Option<&str>, message: &str) {
    log::debug!("{}", format_entry(source, region, message));
}

// ---------------------------------------------------------------------------
// Data-Quality Logging
// ---------------------------------------------------------------------------

/// Log one nulled feature value with automatic classification.
pub fn log_quality_event(region: &str, event: &QualityEvent) {
    let failure_type = classify_feature_error(&event.reason);
    let message = format!(
        "{} {} nulled [{}]: {}",
        event.date, event.feature, failure_type, event.reason
    );

    match failure_type {
        FailureType::Expected => debug(LogSource::Features, Some(region), &message),
        FailureType::Unexpected => warn(LogSource::Features, Some(region), &message),
    }
}

/// Log a summary of the quality events of one region run.
pub fn log_quality_summary(region: &str, events: &[QualityEvent]) {
    if events.is_empty() {
        return;
    }
    let unexpected = events
        .iter()
        .filter(|e| classify_feature_error(&e.reason) == FailureType::Unexpected)
        .count();
    let message = format!(
        "{} feature values nulled ({} unexpected, {} expected)",
        events.len(),
        unexpected,
        events.len() - unexpected
    );
    if unexpected > 0 {
        warn(LogSource::Features, Some(region), &message);
    } else {
        info(LogSource::Features, Some(region), &message);
    }
}

// ---------------------------------------------------------------------------
// Reader Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one source reader invocation
pub fn log_reader_summary(
    source: SourceId,
    total: usize,
    accepted: usize,
    unknown_region: usize,
    malformed: usize,
    superseded: usize,
) {
    let message = format!(
        "Read complete: {}/{} accepted, {} unknown region, {} malformed, {} superseded",
        accepted, total, unknown_region, malformed, superseded
    );

    if accepted == 0 && total > 0 {
        error(LogSource::Feed(source), None, &message);
    } else if unknown_region + malformed > 0 {
        warn(LogSource::Feed(source), None, &message);
    } else {
        info(LogSource::Feed(source), None, &message);
    }
}
