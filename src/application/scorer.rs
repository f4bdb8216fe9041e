//! Scorer: classifier probability to readmission flag.

use crate::domain::{FeatureVector, ScoringResult};
use crate::ports::{Classifier, ModelError};

/// Wraps the frozen classifier. Holds no mutable state.
#[derive(Debug)]
pub struct Scorer {
    classifier: Box<dyn Classifier>,
}

impl Scorer {
    #[must_use]
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self { classifier }
    }

    #[must_use]
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Positive-class probability and the thresholded flag.
    ///
    /// # Errors
    /// Refuses a vector holding NaN or infinity; propagates classifier
    /// failures (width mismatch, non-finite output).
    pub fn score(&self, vector: &FeatureVector) -> Result<ScoringResult, ModelError> {
        if let Some((column, _)) = vector.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ModelError::NonFiniteInput {
                column: column.to_string(),
            });
        }
        let probability = self.classifier.predict_proba(vector.values())?;
        let result = ScoringResult::from_probability(probability);
        tracing::debug!(
            probability = result.probability,
            readmitted = result.readmitted,
            risk = %result.risk_level,
            "Scored record"
        );
        Ok(result)
    }
}
