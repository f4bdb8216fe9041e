//! # readmit
//!
//! Hospital readmission-risk scoring over frozen, pre-trained artifacts.
//!
//! A raw intake record flows through six stages:
//! field normalizer, feature deriver, categorical encoder, schema aligner,
//! imputer/scaler adapter and scorer. The result is a readmission
//! probability, a flag at the 0.5 decision threshold, and a
//! persistence-ready row.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (records, feature sets, artifacts, scores)
//! - `ports`: Trait definitions for the classifier and the artifact store
//! - `adapters`: Filesystem artifact store, model families, log sanitizer
//! - `application`: The pipeline stages and their orchestration
//! - `cli`: Batch scoring front end used by the `readmit` binary

pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::ScoringPipeline;
pub use domain::{PatientRecord, RawRecord, RiskLevel, ScoredPatient, ScoringResult};

/// Result type for readmit operations
pub type Result<T> = std::result::Result<T, ReadmitError>;

/// Main error type for readmit
#[derive(Debug, thiserror::Error)]
pub enum ReadmitError {
    #[error("Invalid patient data: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(#[from] domain::SchemaMismatchError),

    #[error("Artifact load failed: {0}")]
    Artifact(#[from] ports::ArtifactError),

    #[error("Model evaluation failed: {0}")]
    Model(#[from] ports::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReadmitError {
    /// Whether the error rejects the individual record (as opposed to a
    /// pipeline or artifact fault).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
