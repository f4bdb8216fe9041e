//! Ports layer: Trait definitions at the pipeline's outer seams.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the scoring pipeline and the frozen artifacts it consumes.

mod artifact_store;
mod classifier;

pub use artifact_store::{ArtifactError, ArtifactStore};
pub use classifier::{Classifier, ModelError};
