use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use radiomap::config::RuntimeConfig;
use radiomap::{IngestReport, Submission};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};

/// Batched ingestion of cell and Wi-Fi observations
#[derive(Parser)]
#[command(name = "radiomap")]
#[command(version)]
#[command(about = "Batched ingestion of cell and Wi-Fi observations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Storage connection string (overrides config file)
    #[arg(long, value_name = "URI", global = true)]
    sqluri: Option<String>,

    /// Records per batch, -1 to disable batching (overrides config file)
    #[arg(long, value_name = "N", allow_hyphen_values = true, global = true)]
    batch_size: Option<i64>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay NDJSON submissions (one {"items": [...]} per line) through the pipeline
    Ingest {
        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Print the resolved configuration as TOML
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::load().context("Failed to load configuration")?,
    };
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    match cli.command {
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Ingest { input } => run_ingest(&config, input),
    }
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(uri) = &cli.sqluri {
        config.storage.sqluri = uri.clone();
    }
    if let Some(size) = cli.batch_size {
        config.batch.batch_size = size;
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
}

fn run_ingest(config: &RuntimeConfig, input: Option<PathBuf>) -> Result<()> {
    radiomap::init_tracing(&config.log);

    let tokio_rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let runtime = radiomap::init_pipeline(config, tokio_rt.handle())?;

    let reader: Box<dyn BufRead> = match &input {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let mut totals = IngestReport::default();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }

        let submission: Submission = match serde_json::from_str(&line) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(line = line_no + 1, "Skipping invalid submission: {}", e);
                continue;
            }
        };

        let report = runtime
            .pipeline
            .add_measures(submission.items)
            .with_context(|| format!("Failed to ingest submission on line {}", line_no + 1))?;
        totals.accepted += report.accepted;
        totals.flushed += report.flushed;
        totals.batches += report.batches;
        totals.pending = report.pending;
    }

    info!(
        accepted = totals.accepted,
        flushed = totals.flushed,
        batches = totals.batches,
        pending = totals.pending,
        "Input exhausted"
    );

    tokio_rt.block_on(runtime.shutdown())
}
