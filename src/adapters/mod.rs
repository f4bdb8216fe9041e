//! Adapters layer: concrete implementations of ports.
//!
//! - `fs_artifacts`: signed artifact directory on the local filesystem
//! - `models`: classifier families deserialized from `model.json`
//! - `sanitize`: PII filtering for logs

pub mod fs_artifacts;
pub mod models;
pub mod sanitize;

pub use fs_artifacts::{FsArtifactStore, SignaturePolicy};
