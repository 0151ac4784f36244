//! Regime-engine batch driver.
//!
//! Reads feature snapshots from a JSON-lines file, runs each through the
//! classifier and the per-symbol hysteresis debouncer, and appends decision
//! records to an output log.
//!
//! Usage:
//!   regime-engine --input snapshots.jsonl --output decisions.jsonl
//!
//! Options:
//!   -c, --config <FILE>     TOML config file (defaults are used when absent)
//!   -i, --input <FILE>      Snapshot JSONL input
//!   -o, --output <FILE>     Decision record JSONL output (appended)
//!   --symbols <SYMBOLS>     Comma-separated symbol filter
//!   --log-level <LEVEL>     trace, debug, info, warn, error

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use regime_common::RegimeInputSnapshot;
use regime_engine::{Debouncer, DecisionLogRecord, DecisionLogWriter, EngineConfig, RegimeEngine};

/// CLI arguments for the batch driver.
#[derive(Parser, Debug)]
#[command(name = "regime-engine")]
#[command(about = "Deterministic market regime classifier with hysteresis debouncing")]
#[command(version)]
struct Args {
    /// TOML config file path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot JSONL input file.
    #[arg(short, long)]
    input: PathBuf,

    /// Decision record JSONL output file (appended).
    #[arg(short, long)]
    output: PathBuf,

    /// Comma-separated symbols to process (default: all).
    #[arg(long, value_delimiter = ',')]
    symbols: Option<Vec<String>>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!("unknown log level: {other}");
            return ExitCode::FAILURE;
        }
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install tracing subscriber");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;

    let engine = RegimeEngine::from_config(&config)?;
    let debouncer = Debouncer::new(config.hysteresis.clone());
    let writer = DecisionLogWriter::open(&args.output)
        .with_context(|| format!("opening decision log {}", args.output.display()))?;

    let input = File::open(&args.input)
        .with_context(|| format!("opening snapshot input {}", args.input.display()))?;
    let reader = BufReader::new(input);

    let mut processed = 0u64;
    let mut skipped = 0u64;
    let mut no_winner = 0u64;
    let mut flips = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let snapshot: RegimeInputSnapshot = serde_json::from_str(trimmed)
            .with_context(|| format!("parsing snapshot on line {}", idx + 1))?;

        if let Some(symbols) = &args.symbols {
            if !symbols.iter().any(|s| s == snapshot.symbol()) {
                skipped += 1;
                continue;
            }
        }

        let run = engine.classify(&snapshot)?;
        processed += 1;

        let Some(output) = run.output else {
            no_winner += 1;
            warn!(
                symbol = snapshot.symbol(),
                timestamp_ms = snapshot.timestamp_ms(),
                "every regime vetoed, no decision recorded"
            );
            continue;
        };

        let decision = debouncer.apply(output.clone());
        if decision.transition.flipped {
            flips += 1;
            info!(
                symbol = %output.symbol,
                regime = %decision.output.regime,
                "stable regime flipped"
            );
        }

        let record = DecisionLogRecord::from_decision(&output, &decision);
        writer.append(&record)?;
    }

    info!(
        processed,
        skipped, no_winner, flips, "batch run complete"
    );
    Ok(())
}
