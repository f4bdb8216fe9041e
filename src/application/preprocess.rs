//! Imputer/scaler adapter.

use crate::domain::{FeatureVector, Imputer, Scaler, SchemaMismatchError};

/// Pre-fit imputer followed by the pre-fit standard scaler.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    imputer: Imputer,
    scaler: Scaler,
}

impl Preprocessor {
    #[must_use]
    pub fn new(imputer: Imputer, scaler: Scaler) -> Self {
        Self { imputer, scaler }
    }

    #[must_use]
    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    #[must_use]
    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// Impute NaNs, then standardize. Column order is preserved.
    ///
    /// # Errors
    /// Returns [`SchemaMismatchError::Width`] when the vector does not have the
    /// width the artifacts were fit on; nothing is transformed in that case.
    pub fn apply(&self, mut vector: FeatureVector) -> Result<FeatureVector, SchemaMismatchError> {
        if vector.len() != self.imputer.width() {
            return Err(SchemaMismatchError::Width {
                artifact: "imputer",
                expected: self.imputer.width(),
                actual: vector.len(),
            });
        }
        if vector.len() != self.scaler.width() {
            return Err(SchemaMismatchError::Width {
                artifact: "scaler",
                expected: self.scaler.width(),
                actual: vector.len(),
            });
        }

        let filled = self.imputer.impute(vector.values_mut());
        if filled > 0 {
            tracing::debug!(filled, "Imputed missing values");
        }
        self.scaler.transform(vector.values_mut());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImputeStrategy, TrainingSchema};
    use std::sync::Arc;

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(
            Imputer {
                strategy: ImputeStrategy::Mean,
                statistics: vec![60.0, 28.0],
                feature_names: None,
            },
            Scaler {
                mean: vec![60.0, 28.0],
                scale: vec![10.0, 0.0],
                with_mean: true,
                with_std: true,
                feature_names: None,
            },
        )
    }

    fn vector(values: Vec<f64>) -> FeatureVector {
        let schema = TrainingSchema::new(vec!["age".into(), "bmi".into()]).expect("schema");
        FeatureVector::new(schema.shared_columns(), values)
    }

    #[test]
    fn test_impute_then_scale() {
        let out = preprocessor()
            .apply(vector(vec![f64::NAN, 30.0]))
            .expect("matching width");
        assert_eq!(out.values(), &[0.0, 2.0]);
        assert_eq!(out.columns(), &["age".to_string(), "bmi".to_string()]);
    }

    #[test]
    fn test_width_mismatch() {
        let columns: Arc<[String]> = vec!["age".to_string()].into();
        let err = preprocessor()
            .apply(FeatureVector::new(columns, vec![70.0]))
            .expect_err("narrow vector");
        assert_eq!(
            err,
            SchemaMismatchError::Width {
                artifact: "imputer",
                expected: 2,
                actual: 1
            }
        );
    }
}
