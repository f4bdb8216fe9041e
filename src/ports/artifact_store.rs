//! Artifact store port: where the five frozen artifacts come from.
//!
//! This trait abstracts the artifact location (a directory of JSON files in
//! production) from the pipeline that consumes them.

use std::path::PathBuf;

use crate::domain::{EncodingTable, Imputer, Scaler};

use super::Classifier;

/// A frozen artifact is missing, unreadable, corrupt, or fails verification.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("{artifact} not found at {path:?}")]
    Missing { artifact: &'static str, path: PathBuf },

    #[error("failed to read {artifact}: {source}")]
    Io {
        artifact: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {artifact}: {reason}")]
    Parse { artifact: &'static str, reason: String },

    #[error("{artifact} is corrupt: {reason}")]
    Corrupt { artifact: &'static str, reason: String },

    #[error("artifact integrity check failed: {0}")]
    Integrity(String),

    #[error("artifact signature check failed: {0}")]
    Signature(String),
}

/// Source of the frozen artifacts.
///
/// Each method is called once at startup. Implementations validate the
/// internal consistency of each artifact; cross-artifact width checks are
/// done by the pipeline.
pub trait ArtifactStore {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// # Errors
    /// Returns `ArtifactError` if the classifier cannot be loaded.
    fn load_classifier(&self) -> Result<Box<dyn Classifier>, ArtifactError>;

    /// # Errors
    /// Returns `ArtifactError` if the scaler cannot be loaded.
    fn load_scaler(&self) -> Result<Scaler, ArtifactError>;

    /// # Errors
    /// Returns `ArtifactError` if the imputer cannot be loaded.
    fn load_imputer(&self) -> Result<Imputer, ArtifactError>;

    /// # Errors
    /// Returns `ArtifactError` if the training column list cannot be loaded.
    fn load_training_columns(&self) -> Result<Vec<String>, ArtifactError>;

    /// # Errors
    /// Returns `ArtifactError` if the categorical encoders cannot be loaded.
    fn load_encoders(&self) -> Result<EncodingTable, ArtifactError>;
}
