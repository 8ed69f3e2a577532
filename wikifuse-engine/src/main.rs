//! wikifuse - Command-line entry point
//!
//! Reads a JSON array of scraped records from a file or stdin, runs one
//! engine operation and writes pretty JSON to a file or stdout. Logs go to
//! stderr so stdout stays machine-readable.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wikifuse_engine::{
    DetectionAlgorithm, FusionCoordinator, Record, RemovalStrategy, Settings,
};

/// Command-line arguments for wikifuse
#[derive(Parser, Debug)]
#[command(name = "wikifuse")]
#[command(about = "Record linkage and fusion for scraped wiki entities")]
#[command(version)]
struct Args {
    /// Settings file (TOML with [logging] and [fusion] sections)
    #[arg(short, long, global = true, env = "WIKIFUSE_CONFIG")]
    config: Option<PathBuf>,

    /// Input JSON file (stdin when omitted)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Output JSON file (stdout when omitted)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fuse duplicate records into canonical records
    Fuse,

    /// Report duplicate groups without merging
    Detect {
        /// exact, fuzzy, hybrid or advanced (defaults to the configured batch algorithm)
        #[arg(short, long, value_parser = DetectionAlgorithm::from_str)]
        algorithm: Option<DetectionAlgorithm>,
    },

    /// Collapse duplicate groups into single records
    Dedupe {
        /// keep-first, keep-last, keep-best or merge
        #[arg(short, long, default_value = "keep-best", value_parser = RemovalStrategy::from_str)]
        strategy: RemovalStrategy,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let records = read_records(args.input.as_deref())?;
    info!(records = records.len(), "Loaded input records");

    let coordinator = FusionCoordinator::new(settings.fusion.clone())
        .context("Failed to initialize fusion engine")?;

    match args.command {
        Command::Fuse => {
            let fused = coordinator.batch_fuse(&records);
            write_json(args.output.as_deref(), &fused)?;
        }
        Command::Detect { algorithm } => {
            let algorithm = algorithm.unwrap_or(settings.fusion.batch_algorithm);
            let report = coordinator.detector().find_duplicates(&records, algorithm);
            info!("{}", report.statistics.display_string());
            write_json(args.output.as_deref(), &report)?;
        }
        Command::Dedupe { strategy } => {
            let outcome = coordinator.detector().remove_duplicates(&records, strategy);
            info!("{}", outcome.statistics.display_string());
            write_json(args.output.as_deref(), &outcome.records)?;
        }
    }

    Ok(())
}

/// Read a JSON array of records (or a single record object)
///
/// Bytes are decoded lossily; array items that are not objects are dropped.
fn read_records(input: Option<&Path>) -> Result<Vec<Record>> {
    let bytes = match input {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input file {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let text = String::from_utf8_lossy(&bytes);
    let value: Value = serde_json::from_str(&text).context("Input is not valid JSON")?;

    match value {
        Value::Array(items) => {
            let total = items.len();
            let records: Vec<Record> = items
                .into_iter()
                .filter(Value::is_object)
                .map(Record::from_value)
                .collect();
            if records.len() < total {
                warn!(dropped = total - records.len(), "Ignoring non-object input items");
            }
            Ok(records)
        }
        Value::Object(_) => Ok(vec![Record::from_value(value)]),
        _ => bail!("Input must be a JSON array of record objects"),
    }
}

fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    json.push('\n');

    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write output file {}", path.display()))?,
        None => io::stdout()
            .write_all(json.as_bytes())
            .context("Failed to write to stdout")?,
    }

    Ok(())
}
