use serde::{Deserialize, Serialize};

use super::{check_width, checked_probability, sigmoid};
use crate::ports::{Classifier, ModelError};

/// Logistic regression: `sigmoid(w . x + b)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid("non-finite coefficient".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }
}

impl Classifier for LogisticModel {
    fn kind(&self) -> &'static str {
        "logistic"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        check_width(self.coefficients.len(), features)?;
        let logit = self.decision_function(features);
        tracing::trace!(logit, "logistic decision function");
        checked_probability(sigmoid(logit))
    }
}
