//! Feature sets as they move through the pipeline.
//!
//! - [`FeatureFrame`]: normalized + derived features, numeric and categorical
//!   side by side (output of the deriver).
//! - [`EncodedFeatures`]: purely numeric mapping after categorical encoding.
//! - [`FeatureVector`]: the numeric values laid out in training column order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::Serialize;

/// Engineered column names.
pub mod column {
    pub const SYSTOLIC: &str = "systolic";
    pub const DIASTOLIC: &str = "diastolic";
    pub const PULSE_PRESSURE: &str = "pulse_pressure";
    pub const BMI_CATEGORY: &str = "bmi_category";
    pub const HIGH_CHOLESTEROL: &str = "high_cholesterol";
    pub const HIGH_RISK_AGE: &str = "high_risk_age";
    pub const POLYPHARMACY: &str = "polypharmacy";
    pub const LONG_STAY: &str = "long_stay";
    pub const MULTI_COMORBIDITY: &str = "multi_comorbidity";
    pub const AGE_BMI: &str = "age_bmi";
    pub const STAY_MEDS: &str = "stay_meds";
}

/// Columns the deriver adds on top of the normalized numeric fields.
pub const ENGINEERED_COLUMNS: [&str; 11] = [
    column::SYSTOLIC,
    column::DIASTOLIC,
    column::PULSE_PRESSURE,
    column::BMI_CATEGORY,
    column::HIGH_CHOLESTEROL,
    column::HIGH_RISK_AGE,
    column::POLYPHARMACY,
    column::LONG_STAY,
    column::MULTI_COMORBIDITY,
    column::AGE_BMI,
    column::STAY_MEDS,
];

/// Columns that are numeric by construction and are never label-encoded,
/// even if an encoder with the same name ships in the encoding table.
pub const NUMERIC_LIKE_COLUMNS: [&str; 18] = [
    "age",
    "bmi",
    "cholesterol",
    "medication_count",
    "length_of_stay",
    column::SYSTOLIC,
    column::DIASTOLIC,
    column::PULSE_PRESSURE,
    column::BMI_CATEGORY,
    column::HIGH_CHOLESTEROL,
    column::HIGH_RISK_AGE,
    column::POLYPHARMACY,
    column::LONG_STAY,
    column::MULTI_COMORBIDITY,
    column::AGE_BMI,
    column::STAY_MEDS,
    "diabetes",
    "hypertension",
];

#[must_use]
pub fn is_numeric_like(name: &str) -> bool {
    NUMERIC_LIKE_COLUMNS.contains(&name)
}

/// Name of the indicator column for `class` of the dummy-encoded `prefix`.
#[must_use]
pub fn dummy_column(prefix: &str, class: &str) -> String {
    format!("{prefix}_{class}")
}

/// Working set produced by the feature deriver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    numeric: BTreeMap<String, f64>,
    categorical: BTreeMap<String, String>,
}

impl FeatureFrame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_numeric(&mut self, name: impl Into<String>, value: f64) {
        self.numeric.insert(name.into(), value);
    }

    pub fn set_categorical(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.categorical.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.numeric.get(name).copied()
    }

    #[must_use]
    pub fn categorical(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric.keys().map(String::as_str)
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.categorical.keys().map(String::as_str)
    }

    #[must_use]
    pub fn into_parts(self) -> (BTreeMap<String, f64>, BTreeMap<String, String>) {
        (self.numeric, self.categorical)
    }
}

/// Numeric features keyed by column name, before alignment.
pub type EncodedFeatures = BTreeMap<String, f64>;

/// Feature values laid out in training column order.
///
/// The column list is shared with the training schema it was aligned against.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// # Panics
    /// Panics if `values` and `columns` differ in length; callers in this
    /// crate only build vectors through the schema aligner.
    #[must_use]
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<f64>) -> Self {
        assert_eq!(columns.len(), values.len(), "feature vector width");
        Self { columns, values }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Back to a keyed mapping (loses column order).
    #[must_use]
    pub fn to_features(&self) -> EncodedFeatures {
        self.iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

// Serialized as a JSON object in column order.
impl Serialize for FeatureVector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_like_covers_engineered_columns() {
        for name in ENGINEERED_COLUMNS {
            assert!(is_numeric_like(name), "{name}");
        }
        assert!(!is_numeric_like("gender"));
        assert!(!is_numeric_like("discharge_destination"));
    }

    #[test]
    fn test_dummy_column_naming() {
        assert_eq!(
            dummy_column("discharge_destination", "SNF"),
            "discharge_destination_SNF"
        );
    }

    #[test]
    fn test_vector_serializes_in_column_order() {
        let columns: Arc<[String]> = vec!["zeta".to_string(), "alpha".to_string()].into();
        let vector = FeatureVector::new(columns, vec![1.0, 2.0]);
        let json = serde_json::to_string(&vector).expect("serialize");
        assert_eq!(json, r#"{"zeta":1.0,"alpha":2.0}"#);
        assert_eq!(vector.get("alpha"), Some(2.0));
        assert_eq!(vector.get("missing"), None);
    }
}
