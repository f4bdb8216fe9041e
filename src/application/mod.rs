//! Application layer: the pipeline stages and their orchestration.
//!
//! Each stage is a pure transform; [`ScoringPipeline`] wires them over one
//! set of frozen artifacts.

mod aligner;
mod deriver;
mod encoder;
mod normalizer;
mod pipeline;
mod preprocess;
mod scorer;

pub use aligner::align;
pub use deriver::{bmi_category, derive_features};
pub use encoder::CategoricalEncoder;
pub use normalizer::normalize;
pub use pipeline::ScoringPipeline;
pub use preprocess::Preprocessor;
pub use scorer::Scorer;
