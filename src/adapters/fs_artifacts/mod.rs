//! Filesystem artifact store: the five frozen artifacts as JSON files in
//! one directory.
//!
//! | file                    | artifact                     |
//! |-------------------------|------------------------------|
//! | `model.json`            | classifier ([`ModelArtifact`]) |
//! | `scaler.json`           | standard scaler              |
//! | `imputer.json`          | missing-value imputer        |
//! | `training_columns.json` | ordered training column list |
//! | `label_encoders.json`   | per-column categorical classes |
//!
//! # Integrity
//!
//! When the directory carries `manifest.json` every artifact file must be
//! bound by it and match its SHA-256 digest; when it also carries
//! `artifacts.sig` the manifest must verify under the configured Ed25519 key.
//! See [`manifest`].

pub mod manifest;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::adapters::models::ModelArtifact;
use crate::domain::{EncodingTable, Imputer, Scaler};
use crate::ports::{ArtifactError, ArtifactStore, Classifier};

pub use manifest::{ArtifactManifest, SignaturePolicy};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const IMPUTER_FILE: &str = "imputer.json";
pub const TRAINING_COLUMNS_FILE: &str = "training_columns.json";
pub const ENCODERS_FILE: &str = "label_encoders.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "artifacts.sig";

/// Every file a complete artifact directory must contain.
pub const ARTIFACT_FILES: [&str; 5] = [
    MODEL_FILE,
    SCALER_FILE,
    IMPUTER_FILE,
    TRAINING_COLUMNS_FILE,
    ENCODERS_FILE,
];

/// Artifact store backed by a directory of JSON exports.
#[derive(Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
    manifest: Option<ArtifactManifest>,
}

impl FsArtifactStore {
    /// Open an artifact directory, verifying its manifest under `policy`.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the directory is missing or verification fails.
    pub fn open(dir: impl Into<PathBuf>, policy: &SignaturePolicy) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ArtifactError::Missing {
                artifact: "artifact directory",
                path: dir,
            });
        }
        let manifest = manifest::verify(&dir, policy)?;
        Ok(Self { dir, manifest })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.manifest.is_some()
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        artifact: &'static str,
        file: &str,
    ) -> Result<T, ArtifactError> {
        if let Some(manifest) = &self.manifest {
            if !manifest.binds(file) {
                return Err(ArtifactError::Integrity(format!(
                    "{file} is not bound by the manifest"
                )));
            }
        }
        let path = self.dir.join(file);
        let bytes = std::fs::read(&path)
            .map_err(|source| manifest::io_or_missing(artifact, &path, source))?;
        let value = serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Parse {
            artifact,
            reason: e.to_string(),
        })?;
        tracing::debug!(artifact, path = ?path, bytes = bytes.len(), "Loaded artifact");
        Ok(value)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn describe(&self) -> String {
        format!(
            "{} ({})",
            self.dir.display(),
            if self.is_verified() { "verified" } else { "unverified" }
        )
    }

    fn load_classifier(&self) -> Result<Box<dyn Classifier>, ArtifactError> {
        let artifact: ModelArtifact = self.read_json("classifier", MODEL_FILE)?;
        artifact
            .into_classifier()
            .map_err(|e| ArtifactError::Corrupt {
                artifact: "classifier",
                reason: e.to_string(),
            })
    }

    fn load_scaler(&self) -> Result<Scaler, ArtifactError> {
        let scaler: Scaler = self.read_json("scaler", SCALER_FILE)?;
        scaler.validate().map_err(|reason| ArtifactError::Corrupt {
            artifact: "scaler",
            reason,
        })?;
        Ok(scaler)
    }

    fn load_imputer(&self) -> Result<Imputer, ArtifactError> {
        let imputer: Imputer = self.read_json("imputer", IMPUTER_FILE)?;
        imputer.validate().map_err(|reason| ArtifactError::Corrupt {
            artifact: "imputer",
            reason,
        })?;
        Ok(imputer)
    }

    fn load_training_columns(&self) -> Result<Vec<String>, ArtifactError> {
        self.read_json("training columns", TRAINING_COLUMNS_FILE)
    }

    fn load_encoders(&self) -> Result<EncodingTable, ArtifactError> {
        let table: EncodingTable = self.read_json("label encoders", ENCODERS_FILE)?;
        table.validate().map_err(|reason| ArtifactError::Corrupt {
            artifact: "label encoders",
            reason,
        })?;
        Ok(table)
    }
}
