//! Patient intake records: the raw wire form and the normalized form.
//!
//! A [`RawRecord`] is exactly what the intake form sent (strings, numbers,
//! booleans or null). A [`PatientRecord`] is the same patient after the field
//! normalizer has coerced every model-relevant field to its canonical type.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ValidationError;

/// Wire names of the patient fields.
pub mod field {
    pub const NAME: &str = "name";
    pub const ADDRESS: &str = "address";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const BMI: &str = "bmi";
    pub const CHOLESTEROL: &str = "cholesterol";
    pub const BLOOD_PRESSURE: &str = "blood_pressure";
    pub const DIABETES: &str = "diabetes";
    pub const HYPERTENSION: &str = "hypertension";
    pub const MEDICATION_COUNT: &str = "medication_count";
    pub const LENGTH_OF_STAY: &str = "length_of_stay";
    pub const DISCHARGE_DESTINATION: &str = "discharge_destination";
    pub const PHONE_NUMBER: &str = "phonenumber";
    pub const PHONE_ALIAS: &str = "phone";
    pub const EMAIL: &str = "email";
    pub const ID: &str = "id";
    pub const DOCTOR_ID: &str = "doctor_id";
}

/// Fields that an update request may overwrite before the record is re-scored.
pub const UPDATABLE_FIELDS: [&str; 14] = [
    field::NAME,
    field::ADDRESS,
    field::AGE,
    field::GENDER,
    field::BMI,
    field::CHOLESTEROL,
    field::BLOOD_PRESSURE,
    field::DIABETES,
    field::HYPERTENSION,
    field::MEDICATION_COUNT,
    field::LENGTH_OF_STAY,
    field::DISCHARGE_DESTINATION,
    field::PHONE_NUMBER,
    field::EMAIL,
];

/// Identity and contact fields. They ride along on the record but never
/// become model features.
pub const IDENTITY_FIELDS: [&str; 7] = [
    field::NAME,
    field::ADDRESS,
    field::PHONE_NUMBER,
    field::PHONE_ALIAS,
    field::EMAIL,
    field::ID,
    field::DOCTOR_ID,
];

/// A patient record as received, before any coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Look up a field, treating `null` and blank strings as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            v => Some(v),
        }
    }

    /// Look up a field and render it as text (strings verbatim, scalars via JSON).
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).map(value_as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlay the updatable fields present in `updates` onto this record.
    ///
    /// Keys outside [`UPDATABLE_FIELDS`] are ignored.
    ///
    /// # Errors
    /// Returns [`ValidationError::NoUpdatableFields`] when `updates` carries
    /// none of the updatable fields.
    pub fn merged_with(&self, updates: &RawRecord) -> Result<RawRecord, ValidationError> {
        let mut merged = self.clone();
        let mut applied = 0usize;
        for key in UPDATABLE_FIELDS {
            if let Some(value) = updates.fields.get(key) {
                merged.fields.insert(key.to_string(), value.clone());
                applied += 1;
            }
        }
        if applied == 0 {
            return Err(ValidationError::NoUpdatableFields);
        }
        Ok(merged)
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Largest plausible pressure reading, in mmHg.
pub const MAX_PRESSURE_MMHG: i64 = 400;

/// Systolic/diastolic pair parsed from the `"SYS/DIA"` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: i64,
    pub diastolic: i64,
}

impl BloodPressure {
    #[must_use]
    pub fn pulse_pressure(&self) -> i64 {
        self.systolic.saturating_sub(self.diastolic)
    }
}

impl FromStr for BloodPressure {
    type Err = ValidationError;

    /// Exactly one `/` between two integer tokens; surrounding whitespace is
    /// tolerated on each token. Each reading must lie in
    /// `0..=MAX_PRESSURE_MMHG`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = ValidationError::BloodPressureFormat {
            field: field::BLOOD_PRESSURE,
        };
        let (sys, dia) = s.split_once('/').ok_or_else(|| err.clone())?;
        if dia.contains('/') {
            return Err(err);
        }
        let systolic = sys.trim().parse::<i64>().map_err(|_| err.clone())?;
        let diastolic = dia.trim().parse::<i64>().map_err(|_| err)?;
        for reading in [systolic, diastolic] {
            if !(0..=MAX_PRESSURE_MMHG).contains(&reading) {
                return Err(ValidationError::OutOfRange {
                    field: field::BLOOD_PRESSURE,
                    reason: format!("readings must be between 0 and {MAX_PRESSURE_MMHG} mmHg"),
                });
            }
        }
        Ok(Self {
            systolic,
            diastolic,
        })
    }
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

/// A patient record after field normalization.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,

    /// Categorical; encoded against the learned classes, unseen values fall back.
    pub gender: Option<String>,
    /// Categorical; expanded into dummy columns.
    pub discharge_destination: Option<String>,

    pub age: f64,
    pub bmi: f64,
    pub cholesterol: f64,
    pub medication_count: f64,
    /// Days.
    pub length_of_stay: f64,
    pub blood_pressure: BloodPressure,

    /// 0 or 1.
    pub diabetes: u8,
    /// 0 or 1.
    pub hypertension: u8,

    /// Any other text field that is not identity/contact data.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_categorical: BTreeMap<String, String>,
}

// Identity/contact fields stay out of Debug output so records can be logged.
impl fmt::Debug for PatientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatientRecord")
            .field("gender", &self.gender)
            .field("discharge_destination", &self.discharge_destination)
            .field("age", &self.age)
            .field("bmi", &self.bmi)
            .field("cholesterol", &self.cholesterol)
            .field("medication_count", &self.medication_count)
            .field("length_of_stay", &self.length_of_stay)
            .field("blood_pressure", &self.blood_pressure)
            .field("diabetes", &self.diabetes)
            .field("hypertension", &self.hypertension)
            .field("extra_categorical", &self.extra_categorical)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blood_pressure_parsing() {
        let bp: BloodPressure = "120/80".parse().expect("valid");
        assert_eq!(bp.systolic, 120);
        assert_eq!(bp.diastolic, 80);
        assert_eq!(bp.pulse_pressure(), 40);
        assert_eq!(bp.to_string(), "120/80");

        let bp: BloodPressure = " 135 / 85 ".parse().expect("whitespace tolerated");
        assert_eq!(bp.pulse_pressure(), 50);
    }

    #[test]
    fn test_blood_pressure_rejects_bad_shapes() {
        for bad in ["120", "120/80/60", "/80", "120/", "abc/80", "120.5/80", ""] {
            let err = bad.parse::<BloodPressure>().expect_err(bad);
            assert_eq!(err.field(), Some("blood_pressure"), "input {bad:?}");
        }
    }

    #[test]
    fn test_blood_pressure_rejects_implausible_readings() {
        for bad in ["9223372036854775807/-1", "120/-5", "401/80", "-9223372036854775808/1"] {
            let err = bad.parse::<BloodPressure>().expect_err(bad);
            assert!(
                matches!(err, ValidationError::OutOfRange { field: "blood_pressure", .. }),
                "input {bad:?}: {err:?}"
            );
        }
        let bp: BloodPressure = "400/0".parse().expect("bounds inclusive");
        assert_eq!(bp.pulse_pressure(), 400);

        let extreme = BloodPressure {
            systolic: i64::MAX,
            diastolic: -1,
        };
        assert_eq!(extreme.pulse_pressure(), i64::MAX);
    }

    #[test]
    fn test_raw_record_treats_blank_as_absent() {
        let raw = RawRecord::new()
            .with("age", "")
            .with("bmi", Value::Null)
            .with("gender", "Male");
        assert!(raw.get("age").is_none());
        assert!(raw.get("bmi").is_none());
        assert!(raw.get("missing").is_none());
        assert_eq!(raw.get_text("gender").as_deref(), Some("Male"));
    }

    #[test]
    fn test_raw_record_deserializes_from_json_object() {
        let raw: RawRecord =
            serde_json::from_value(json!({"age": 70, "diabetes": "Yes", "email": null}))
                .expect("object");
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.get("age"), Some(&json!(70)));
        assert_eq!(raw.get_text("age").as_deref(), Some("70"));
    }

    #[test]
    fn test_merge_only_updatable_fields() {
        let existing = RawRecord::new().with("age", 50).with("bmi", 22.0);
        let updates = RawRecord::new()
            .with("age", 71)
            .with("readmitted", true)
            .with("doctor_id", "someone-else");

        let merged = existing.merged_with(&updates).expect("age is updatable");
        assert_eq!(merged.get("age"), Some(&json!(71)));
        assert_eq!(merged.get("bmi"), Some(&json!(22.0)));
        assert!(merged.get("readmitted").is_none());
        assert!(merged.get("doctor_id").is_none());
    }

    #[test]
    fn test_merge_without_updatable_fields_fails() {
        let existing = RawRecord::new().with("age", 50);
        let updates = RawRecord::new().with("readmitted", true);
        assert_eq!(
            existing.merged_with(&updates),
            Err(ValidationError::NoUpdatableFields)
        );
    }

    #[test]
    fn test_debug_omits_contact_fields() {
        let record = PatientRecord {
            name: Some("Jane Roe".into()),
            address: None,
            phone_number: Some("555-123-4567".into()),
            email: Some("jane@example.org".into()),
            gender: Some("Female".into()),
            discharge_destination: Some("Home".into()),
            age: 40.0,
            bmi: 22.0,
            cholesterol: 180.0,
            medication_count: 1.0,
            length_of_stay: 2.0,
            blood_pressure: BloodPressure {
                systolic: 118,
                diastolic: 76,
            },
            diabetes: 0,
            hypertension: 0,
            extra_categorical: BTreeMap::new(),
        };
        let debug = format!("{record:?}");
        assert!(!debug.contains("Jane"));
        assert!(!debug.contains("555"));
        assert!(!debug.contains("example.org"));
        assert!(debug.contains("Female"));
    }
}
