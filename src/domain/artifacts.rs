//! Frozen preprocessing artifacts learned at training time.
//!
//! These types mirror the JSON exported by the training pipeline. They are
//! loaded once at startup and only ever read afterwards.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::SchemaMismatchError;

/// Known classes of one categorical column, in learned index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    #[must_use]
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == value)
    }

    /// Class 0, which absorbs every value unseen during training.
    #[must_use]
    pub fn fallback_class(&self) -> Option<&str> {
        self.classes.first().map(String::as_str)
    }
}

/// Per-column label encoders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingTable {
    encoders: BTreeMap<String, LabelEncoder>,
}

impl EncodingTable {
    #[must_use]
    pub fn new(encoders: BTreeMap<String, LabelEncoder>) -> Self {
        Self { encoders }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelEncoder)> {
        self.encoders.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    /// Every encoder needs at least one class (the fallback) and unique classes.
    ///
    /// # Errors
    /// Returns a description of the first corrupt encoder.
    pub fn validate(&self) -> Result<(), String> {
        for (column, encoder) in &self.encoders {
            if encoder.classes.is_empty() {
                return Err(format!("encoder for {column:?} has no classes"));
            }
            let mut seen = HashSet::new();
            for class in &encoder.classes {
                if !seen.insert(class.as_str()) {
                    return Err(format!("encoder for {column:?} repeats class {class:?}"));
                }
            }
        }
        Ok(())
    }
}

/// Ordered training column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSchema {
    columns: Arc<[String]>,
}

impl TrainingSchema {
    /// # Errors
    /// Fails on an empty list or a repeated column name.
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaMismatchError> {
        if columns.is_empty() {
            return Err(SchemaMismatchError::EmptySchema);
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(SchemaMismatchError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns: columns.into(),
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub(crate) fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Check an artifact's width and, when it recorded them, its column names.
    ///
    /// # Errors
    /// Returns the first width or name disagreement.
    pub fn check_artifact(
        &self,
        artifact: &'static str,
        width: usize,
        feature_names: Option<&[String]>,
    ) -> Result<(), SchemaMismatchError> {
        if width != self.len() {
            return Err(SchemaMismatchError::Width {
                artifact,
                expected: width,
                actual: self.len(),
            });
        }
        if let Some(names) = feature_names {
            if names.len() != self.len() {
                return Err(SchemaMismatchError::Width {
                    artifact,
                    expected: names.len(),
                    actual: self.len(),
                });
            }
            for (index, (found, expected)) in names.iter().zip(self.columns.iter()).enumerate() {
                if found != expected {
                    return Err(SchemaMismatchError::ColumnName {
                        artifact,
                        index,
                        expected: expected.clone(),
                        found: found.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// How the imputer statistics were learned. Informational at inference time:
/// every strategy fills with the stored per-column statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    #[default]
    Mean,
    Median,
    MostFrequent,
    Constant,
}

/// Pre-fit missing-value imputer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    #[serde(default)]
    pub strategy: ImputeStrategy,
    pub statistics: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl Imputer {
    #[must_use]
    pub fn width(&self) -> usize {
        self.statistics.len()
    }

    /// # Errors
    /// Rejects non-finite statistics.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(i) = self.statistics.iter().position(|s| !s.is_finite()) {
            return Err(format!("imputer statistic {i} is not finite"));
        }
        Ok(())
    }

    /// Replace NaN entries with the learned statistic of their column.
    ///
    /// Returns the number of values filled.
    pub fn impute(&self, values: &mut [f64]) -> usize {
        let mut filled = 0;
        for (value, stat) in values.iter_mut().zip(&self.statistics) {
            if value.is_nan() {
                *value = *stat;
                filled += 1;
            }
        }
        filled
    }
}

fn default_true() -> bool {
    true
}

/// Pre-fit standard scaler: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default = "default_true")]
    pub with_mean: bool,
    #[serde(default = "default_true")]
    pub with_std: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl Scaler {
    #[must_use]
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// # Errors
    /// Rejects mismatched lengths and non-finite or negative parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if let Some(i) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(format!("scaler mean {i} is not finite"));
        }
        if let Some(i) = self.scale.iter().position(|s| !s.is_finite() || *s < 0.0) {
            return Err(format!("scaler scale {i} must be finite and non-negative"));
        }
        Ok(())
    }

    /// Standardize in place. A zero scale (constant training column) divides by 1.
    pub fn transform(&self, values: &mut [f64]) {
        for ((value, mean), scale) in values.iter_mut().zip(&self.mean).zip(&self.scale) {
            if self.with_mean {
                *value -= mean;
            }
            if self.with_std {
                let s = if *scale == 0.0 { 1.0 } else { *scale };
                *value /= s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_schema_rejects_empty_and_duplicates() {
        assert_eq!(
            TrainingSchema::new(Vec::new()),
            Err(SchemaMismatchError::EmptySchema)
        );
        assert_eq!(
            TrainingSchema::new(names(&["age", "bmi", "age"])),
            Err(SchemaMismatchError::DuplicateColumn("age".into()))
        );
    }

    #[test]
    fn test_check_artifact_width_and_names() {
        let schema = TrainingSchema::new(names(&["age", "bmi"])).expect("schema");
        assert!(schema.check_artifact("scaler", 2, None).is_ok());
        assert!(matches!(
            schema.check_artifact("scaler", 3, None),
            Err(SchemaMismatchError::Width { expected: 3, actual: 2, .. })
        ));
        let swapped = names(&["bmi", "age"]);
        assert!(matches!(
            schema.check_artifact("imputer", 2, Some(&swapped)),
            Err(SchemaMismatchError::ColumnName { index: 0, .. })
        ));
    }

    #[test]
    fn test_encoding_table_validation() {
        let mut encoders = BTreeMap::new();
        encoders.insert(
            "gender".to_string(),
            LabelEncoder {
                classes: names(&["Female", "Male", "Other"]),
            },
        );
        let table = EncodingTable::new(encoders.clone());
        assert!(table.validate().is_ok());
        assert_eq!(table.get("gender").and_then(LabelEncoder::fallback_class), Some("Female"));

        encoders.insert("empty".to_string(), LabelEncoder { classes: vec![] });
        assert!(EncodingTable::new(encoders).validate().is_err());
    }

    #[test]
    fn test_imputer_fills_only_nan() {
        let imputer = Imputer {
            strategy: ImputeStrategy::Median,
            statistics: vec![10.0, 20.0, 30.0],
            feature_names: None,
        };
        let mut values = [1.0, f64::NAN, 3.0];
        assert_eq!(imputer.impute(&mut values), 1);
        assert_eq!(values, [1.0, 20.0, 3.0]);
    }

    #[test]
    fn test_scaler_standardizes_and_guards_zero_scale() {
        let scaler = Scaler {
            mean: vec![10.0, 5.0],
            scale: vec![2.0, 0.0],
            with_mean: true,
            with_std: true,
            feature_names: None,
        };
        assert!(scaler.validate().is_ok());
        let mut values = [14.0, 7.0];
        scaler.transform(&mut values);
        assert!((values[0] - 2.0).abs() < f64::EPSILON);
        assert!((values[1] - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scaler_json_defaults() {
        let scaler: Scaler =
            serde_json::from_str(r#"{"mean":[0.0],"scale":[1.0]}"#).expect("parse");
        assert!(scaler.with_mean && scaler.with_std);
        assert!(scaler.feature_names.is_none());
    }
}
