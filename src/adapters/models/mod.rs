//! Classifier implementations loadable from `model.json`.
//!
//! The export is tagged by `kind`:
//! - `logistic`: linear model with sigmoid link
//! - `oblivious_trees`: gradient-boosted symmetric trees (CatBoost layout)

mod logistic;
mod oblivious;

use serde::{Deserialize, Serialize};

pub use logistic::LogisticModel;
pub use oblivious::{ObliviousTree, ObliviousTreeEnsemble, TreeSplit};

use crate::ports::{Classifier, ModelError};

/// Model parameters exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
    ObliviousTrees(ObliviousTreeEnsemble),
}

impl ModelArtifact {
    /// Check parameter shapes, then box as a classifier.
    ///
    /// # Errors
    /// Returns `ModelError::Invalid` when the parameters are inconsistent.
    pub fn into_classifier(self) -> Result<Box<dyn Classifier>, ModelError> {
        match self {
            Self::Logistic(m) => {
                m.validate()?;
                Ok(Box::new(m))
            }
            Self::ObliviousTrees(m) => {
                m.validate()?;
                Ok(Box::new(m))
            }
        }
    }
}

/// Logistic function.
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Reject non-finite output and clamp rounding drift into `[0, 1]`.
pub(crate) fn checked_probability(p: f64) -> Result<f64, ModelError> {
    if !p.is_finite() {
        return Err(ModelError::NonFinite);
    }
    Ok(p.clamp(0.0, 1.0))
}

pub(crate) fn check_width(expected: usize, features: &[f64]) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::InputWidth {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_midpoint_and_bounds() {
        assert!((sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
        assert!(sigmoid(40.0) <= 1.0);
        assert!(sigmoid(-40.0) >= 0.0);
    }

    #[test]
    fn test_checked_probability() {
        assert_eq!(checked_probability(f64::NAN), Err(ModelError::NonFinite));
        assert_eq!(checked_probability(1.0 + 1e-12), Ok(1.0));
    }

    #[test]
    fn test_model_artifact_tagged_json() {
        let json = r#"{
            "kind": "logistic",
            "feature_names": ["a", "b"],
            "coefficients": [0.5, -0.25],
            "intercept": 0.1
        }"#;
        let artifact: ModelArtifact = serde_json::from_str(json).expect("parse");
        let model = artifact.into_classifier().expect("valid");
        assert_eq!(model.kind(), "logistic");
        assert_eq!(model.feature_names().len(), 2);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"kind": "neural_net", "feature_names": []}"#;
        assert!(serde_json::from_str::<ModelArtifact>(json).is_err());
    }
}
