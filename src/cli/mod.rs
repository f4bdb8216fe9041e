//! Batch front end for the `readmit` binary.
//!
//! ```text
//! readmit [--artifacts DIR] [--workers N] [--doctor ID] <check|score|features> [INPUT]
//! ```
//!
//! Input is one JSON object, a JSON array of objects, or JSON Lines, read from
//! `INPUT` or stdin. Output is one JSON line per record, in input order.

mod worker;

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::{FeatureVector, PatientRow, RawRecord, RiskLevel, UnseenCategory};
use crate::ReadmitError;

pub use worker::{BatchHandle, BatchJob, BatchWorker, ScoringProgress};

pub const USAGE: &str = "\
Usage: readmit [--artifacts DIR] [--workers N] [--doctor ID] <command> [INPUT]

Commands:
  check            Load and verify the artifacts, print a summary
  score [INPUT]    Score records (JSON object, array or JSON Lines)
  features [INPUT] Print the preprocessed feature vector per record

INPUT defaults to stdin.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CliError {
    #[error("{0}\n\n{usage}", usage = USAGE)]
    Usage(String),

    #[error("help requested")]
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Check,
    Score,
    Features,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub artifacts: Option<PathBuf>,
    pub workers: Option<usize>,
    pub doctor: Option<String>,
    pub command: Command,
    pub input: Option<PathBuf>,
}

/// Parse arguments (without the program name).
///
/// # Errors
/// Returns `CliError::Usage` for unknown flags, missing values or a missing
/// command, and `CliError::Help` for `-h`/`--help`.
pub fn parse_args<I>(args: I) -> Result<CliArgs, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut artifacts = None;
    let mut workers = None;
    let mut doctor = None;
    let mut positional = Vec::new();

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(CliError::Help),
            "--artifacts" => {
                let v = it.next().ok_or_else(|| missing_value("--artifacts"))?;
                artifacts = Some(PathBuf::from(v));
            }
            "--workers" => {
                let v = it.next().ok_or_else(|| missing_value("--workers"))?;
                let n = v
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| CliError::Usage(format!("invalid --workers value {v:?}")))?;
                workers = Some(n);
            }
            "--doctor" => {
                doctor = Some(it.next().ok_or_else(|| missing_value("--doctor"))?);
            }
            flag if flag.starts_with("--") => {
                return Err(CliError::Usage(format!("unknown option {flag}")));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("check") => Command::Check,
        Some("score") => Command::Score,
        Some("features") => Command::Features,
        Some(other) => return Err(CliError::Usage(format!("unknown command {other:?}"))),
        None => return Err(CliError::Usage("missing command".into())),
    };
    let input = positional.next().map(PathBuf::from);
    if let Some(extra) = positional.next() {
        return Err(CliError::Usage(format!("unexpected argument {extra:?}")));
    }
    if command == Command::Check && input.is_some() {
        return Err(CliError::Usage("check takes no input".into()));
    }

    Ok(CliArgs {
        artifacts,
        workers,
        doctor,
        command,
        input,
    })
}

fn missing_value(flag: &str) -> CliError {
    CliError::Usage(format!("{flag} requires a value"))
}

/// Parse a JSON object, a JSON array of objects, or JSON Lines.
///
/// # Errors
/// Returns the first JSON syntax or shape error.
pub fn read_records(text: &str) -> Result<Vec<RawRecord>, ReadmitError> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    let records = serde_json::Deserializer::from_str(trimmed)
        .into_iter::<RawRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// One output line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutput {
    Scored {
        index: usize,
        row: PatientRow,
        risk_level: RiskLevel,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        unseen_categories: Vec<UnseenCategory>,
    },
    Features {
        index: usize,
        features: FeatureVector,
    },
    Rejected {
        index: usize,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<&'static str>,
    },
}

impl RecordOutput {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Scored { index, .. }
            | Self::Features { index, .. }
            | Self::Rejected { index, .. } => *index,
        }
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub(crate) fn rejected(index: usize, err: &ReadmitError) -> Self {
        let field = match err {
            ReadmitError::Validation(v) => v.field(),
            _ => None,
        };
        Self::Rejected {
            index,
            error: err.to_string(),
            field,
        }
    }
}

/// Write one JSON line per output. Returns whether any record was rejected.
///
/// # Errors
/// Propagates write and serialization failures.
pub fn write_outputs<W: Write>(out: &mut W, outputs: &[RecordOutput]) -> Result<bool, ReadmitError> {
    let mut any_rejected = false;
    for output in outputs {
        serde_json::to_writer(&mut *out, output)?;
        out.write_all(b"\n")?;
        any_rejected |= output.is_rejected();
    }
    out.flush()?;
    Ok(any_rejected)
}
