//! agroclim: consolidate regional satellite and climate extracts.
//!
//! Reads a JSON file of raw source batches, consolidates every requested
//! region over the given date range and writes the feature-enriched rows as
//! JSON lines, plus an optional availability report.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;
use log::LevelFilter;

use agroclim_service::availability::{self, AvailabilityReport};
use agroclim_service::config::{self, EngineConfig};
use agroclim_service::ingest::reader::RawBatch;
use agroclim_service::logging::{self, LogSource};
use agroclim_service::output;
use agroclim_service::Consolidator;

#[derive(Parser, Debug)]
#[command(name = "agroclim")]
#[command(about = "Consolidate regional agro-climate observations into feature-enriched daily rows")]
#[command(version)]
struct Args {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "AGROCLIM_CONFIG")]
    config: Option<PathBuf>,

    /// Raw batches: a JSON array of {"source": ..., "rows": [...]}
    #[arg(short, long)]
    input: PathBuf,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last day of the range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,

    /// Region to consolidate; repeat for several. Defaults to every region in the input.
    #[arg(short, long = "region")]
    regions: Vec<String>,

    /// Output file for JSON-lines rows. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the availability report (JSON) to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Only emit rows scoring above this completeness
    #[arg(long)]
    min_completeness: Option<f64>,

    #[arg(long, default_value = "info", env = "AGROCLIM_LOG_LEVEL")]
    log_level: LevelFilter,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<String>,
}

fn load_engine_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = config::load_config(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            logging::info(LogSource::Config, None, &format!("Loaded {}", path.display()));
            Ok(config)
        }
        None => {
            logging::info(LogSource::Config, None, "No configuration file, using defaults");
            Ok(EngineConfig::default())
        }
    }
}

fn read_batches_file(path: &PathBuf) -> Result<Vec<RawBatch>> {
    let file = File::open(path).with_context(|| format!("opening input {}", path.display()))?;
    let batches: Vec<RawBatch> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing input {}", path.display()))?;
    Ok(batches)
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    logging::init_logger(args.log_level, args.log_file.as_deref()).context("initializing logger")?;
    logging::info(
        LogSource::Engine,
        None,
        &format!("agroclim v{} starting", env!("CARGO_PKG_VERSION")),
    );

    let config = load_engine_config(args.config.as_ref())?;
    let batches = read_batches_file(&args.input)?;

    let consolidator = Consolidator::new(config);
    let only = (!args.regions.is_empty()).then_some(args.regions.as_slice());
    let outcome = consolidator.consolidate_regions(&batches, args.start, args.end, only);

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let mut written = 0;
    let mut reports: Vec<AvailabilityReport> = Vec::new();
    for consolidation in outcome.succeeded() {
        written += output::write_json_lines(&mut writer, &consolidation.records, args.min_completeness)
            .context("writing output rows")?;
        reports.push(consolidation.report.clone());
    }
    writer.flush().context("flushing output")?;

    if let Some(path) = &args.report {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &reports).context("writing availability report")?;
    }

    if args.output.is_some() {
        availability::print_summary(&reports);
    }

    let failed = outcome.failed().count();
    logging::info(
        LogSource::Engine,
        None,
        &format!(
            "Wrote {} rows for {} of {} regions ({} failed)",
            written,
            outcome.results.len() - failed,
            outcome.results.len(),
            failed
        ),
    );

    if outcome.results.is_empty() {
        bail!("no regions to consolidate: the input holds no rows for a known region");
    }
    if outcome.all_failed() {
        bail!("every requested region failed");
    }
    Ok(())
}
