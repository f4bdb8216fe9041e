//! Runtime configuration, read once from the environment at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `READMIT_ARTIFACT_DIR` | `models` |
//! | `READMIT_REQUIRE_SIGNED_ARTIFACTS` | off in debug builds, on in release |
//! | `READMIT_ARTIFACT_PUBKEY_B64` / `READMIT_ARTIFACT_PUBKEY_B64_FILE` | none |
//! | `READMIT_WORKERS` | available parallelism |
//! | `READMIT_LOG_MODE` | `stderr` (or `file`) |
//! | `READMIT_LOG_FILE` | `logs/readmit.log` |

use std::path::PathBuf;

use crate::adapters::fs_artifacts::manifest::verifying_key_from_b64;
use crate::adapters::SignaturePolicy;
use crate::ports::ArtifactError;

pub const ARTIFACT_DIR_ENV: &str = "READMIT_ARTIFACT_DIR";
pub const REQUIRE_SIGNED_ENV: &str = "READMIT_REQUIRE_SIGNED_ARTIFACTS";
pub const PUBKEY_B64_ENV: &str = "READMIT_ARTIFACT_PUBKEY_B64";
pub const PUBKEY_B64_FILE_ENV: &str = "READMIT_ARTIFACT_PUBKEY_B64_FILE";
pub const WORKERS_ENV: &str = "READMIT_WORKERS";
pub const LOG_MODE_ENV: &str = "READMIT_LOG_MODE";
pub const LOG_FILE_ENV: &str = "READMIT_LOG_FILE";

const DEFAULT_ARTIFACT_DIR: &str = "models";
const DEFAULT_LOG_FILE: &str = "logs/readmit.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Where log lines go. Stdout is reserved for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Stderr,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub artifact_dir: PathBuf,
    pub require_signature: bool,
    pub verifying_key_b64: Option<String>,
    pub verifying_key_file: Option<PathBuf>,
    pub workers: usize,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

impl PipelineConfig {
    /// Read the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` for an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `ConfigError` for an unparseable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let workers = match non_empty(WORKERS_ENV) {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: WORKERS_ENV,
                        reason: "expected a positive integer".into(),
                    })
                }
            },
            None => default_workers(),
        };

        let log_mode = match non_empty(LOG_MODE_ENV).as_deref().map(str::trim) {
            None | Some("stderr") => LogMode::Stderr,
            Some("file") => LogMode::File,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_MODE_ENV,
                    reason: format!("unknown mode {other:?}; expected stderr or file"),
                })
            }
        };

        Ok(Self {
            artifact_dir: non_empty(ARTIFACT_DIR_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR), PathBuf::from),
            require_signature: non_empty(REQUIRE_SIGNED_ENV)
                .map_or(!cfg!(debug_assertions), |v| parse_bool(&v)),
            verifying_key_b64: non_empty(PUBKEY_B64_ENV),
            verifying_key_file: non_empty(PUBKEY_B64_FILE_ENV).map(PathBuf::from),
            workers,
            log_mode,
            log_file: non_empty(LOG_FILE_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
        })
    }

    /// Artifact verification policy for this configuration.
    ///
    /// The inline key takes precedence over the key file.
    ///
    /// # Errors
    /// Fails if the key file cannot be read or the key does not decode.
    pub fn signature_policy(&self) -> Result<SignaturePolicy, ArtifactError> {
        let key_b64 = match (&self.verifying_key_b64, &self.verifying_key_file) {
            (Some(b64), _) => Some(b64.clone()),
            (None, Some(path)) => Some(std::fs::read_to_string(path).map_err(|source| {
                ArtifactError::Io {
                    artifact: "artifact verifying key",
                    source,
                }
            })?),
            (None, None) => None,
        };

        let mut policy = SignaturePolicy::unsigned();
        if let Some(b64) = key_b64 {
            policy = policy.with_key(verifying_key_from_b64(b64.trim())?);
        }
        if self.require_signature {
            policy = policy.required();
        }
        Ok(policy)
    }
}
