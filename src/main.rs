//! readmit: hospital readmission-risk scoring.
//!
//! Main entry point for the batch command-line tool.

use std::io::{Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use readmit::adapters::sanitize::SanitizingMakeWriter;
use readmit::adapters::FsArtifactStore;
use readmit::cli::{self, BatchJob, BatchWorker, CliArgs, CliError, Command};
use readmit::config::{LogMode, PipelineConfig};
use readmit::ports::ArtifactStore;
use readmit::ScoringPipeline;

fn main() -> ExitCode {
    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(CliError::Help) => {
            println!("{}", cli::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("readmit: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    let mut config = PipelineConfig::from_env().context("invalid configuration")?;
    if let Some(dir) = args.artifacts.clone() {
        config.artifact_dir = dir;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    // Stdout carries results, so logs go to stderr or a file.
    let (writer, _guard) = match config.log_mode {
        LogMode::File => {
            if let Some(parent) = config.log_file.parent() {
                // Best-effort: opening the file below reports the real error.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.log_file)
                .with_context(|| format!("cannot open log file {:?}", config.log_file))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        require_signature = config.require_signature,
        "Starting readmit..."
    );

    // Log before `_guard` drops so the non-blocking writer flushes the line.
    let outcome = execute(&args, &config);
    match &outcome {
        Ok(_) => tracing::info!("readmit shutdown complete."),
        Err(e) => tracing::error!("{e:#}"),
    }
    outcome
}

fn execute(args: &CliArgs, config: &PipelineConfig) -> Result<ExitCode> {
    // Fail fast: nothing is scored unless every artifact loads and agrees.
    let policy = config
        .signature_policy()
        .context("invalid artifact verifying key")?;
    let store = FsArtifactStore::open(&config.artifact_dir, &policy)
        .with_context(|| format!("cannot open artifacts at {:?}", config.artifact_dir))?;
    let pipeline = ScoringPipeline::load(&store).context("failed to load scoring artifacts")?;

    let code = match args.command {
        Command::Check => {
            print_summary(&store, &pipeline)?;
            ExitCode::SUCCESS
        }
        Command::Score | Command::Features => {
            let text = read_input(args)?;
            let records = cli::read_records(&text).context("malformed input")?;
            let job = match args.command {
                Command::Score => BatchJob::Score {
                    doctor_id: args.doctor.clone(),
                },
                _ => BatchJob::Features,
            };

            let outputs =
                BatchWorker::spawn(Arc::new(pipeline), records, job, config.workers).collect();
            let rejected = outputs.iter().filter(|o| o.is_rejected()).count();
            tracing::info!(records = outputs.len(), rejected, "Batch complete");

            let mut stdout = std::io::stdout().lock();
            if cli::write_outputs(&mut stdout, &outputs)? {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    };

    Ok(code)
}

fn read_input(args: &CliArgs) -> Result<String> {
    match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read input {path:?}")),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("cannot read stdin")?;
            Ok(text)
        }
    }
}

fn print_summary(store: &FsArtifactStore, pipeline: &ScoringPipeline) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "artifacts:  {}", store.describe())?;
    writeln!(out, "classifier: {}", pipeline.classifier_kind())?;
    writeln!(out, "columns:    {}", pipeline.schema().len())?;
    for (column, encoder) in pipeline.encoders().iter() {
        writeln!(out, "encoder:    {column} ({} classes)", encoder.classes.len())?;
    }
    Ok(())
}
