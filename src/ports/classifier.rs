//! Classifier port: the pre-trained model behind the scorer.

/// Errors raised while evaluating a classifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("model expects {expected} features, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    #[error("feature {column} is not finite")]
    NonFiniteInput { column: String },

    #[error("model produced a non-finite probability")]
    NonFinite,

    #[error("invalid model parameters: {0}")]
    Invalid(String),
}

/// A frozen binary classifier.
///
/// Implementations hold only parameters learned offline and must not mutate
/// them while predicting, so one instance can serve concurrent callers.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Short identifier of the model family (for logs and `check` output).
    fn kind(&self) -> &'static str;

    /// Training columns the model was fit against, in order.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive class (readmission).
    ///
    /// # Errors
    /// Returns `ModelError::InputWidth` when `features` has the wrong length
    /// and `ModelError::NonFinite` when the output is not a number.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError>;
}
