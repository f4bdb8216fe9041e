//! Field normalizer: raw intake record to [`PatientRecord`].
//!
//! Pure function of its input. The first failing field (numeric fields, then
//! blood pressure, then the yes/no flags) is reported; values are never logged.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::patient::{field, IDENTITY_FIELDS};
use crate::domain::{BloodPressure, PatientRecord, RawRecord, ValidationError};

/// Fields consumed by the normalizer itself; everything else textual is an
/// extra categorical.
const MODEL_FIELDS: [&str; 10] = [
    field::AGE,
    field::BMI,
    field::CHOLESTEROL,
    field::MEDICATION_COUNT,
    field::LENGTH_OF_STAY,
    field::BLOOD_PRESSURE,
    field::DIABETES,
    field::HYPERTENSION,
    field::GENDER,
    field::DISCHARGE_DESTINATION,
];

/// Lower bound a numeric field must respect.
#[derive(Clone, Copy)]
enum Bound {
    Positive,
    NonNegative,
    Any,
}

/// Normalize a raw record.
///
/// # Errors
/// Returns the [`ValidationError`] of the first field that is missing or
/// cannot be coerced.
pub fn normalize(raw: &RawRecord) -> Result<PatientRecord, ValidationError> {
    let result = normalize_inner(raw);
    if let Err(e) = &result {
        match e.field() {
            Some(field) => tracing::warn!(field, "record rejected by field normalizer"),
            None => tracing::warn!("record rejected by field normalizer"),
        }
    }
    result
}

fn normalize_inner(raw: &RawRecord) -> Result<PatientRecord, ValidationError> {
    let age = numeric(raw, field::AGE, Bound::NonNegative)?;
    let bmi = numeric(raw, field::BMI, Bound::Positive)?;
    let cholesterol = numeric(raw, field::CHOLESTEROL, Bound::Any)?;
    let medication_count = numeric(raw, field::MEDICATION_COUNT, Bound::NonNegative)?;
    let length_of_stay = numeric(raw, field::LENGTH_OF_STAY, Bound::NonNegative)?;

    let blood_pressure = blood_pressure(raw)?;

    let diabetes = yes_no(raw, field::DIABETES)?;
    let hypertension = yes_no(raw, field::HYPERTENSION)?;

    let phone_number = raw
        .get_text(field::PHONE_NUMBER)
        .or_else(|| raw.get_text(field::PHONE_ALIAS));

    Ok(PatientRecord {
        name: raw.get_text(field::NAME),
        address: raw.get_text(field::ADDRESS),
        phone_number,
        email: raw.get_text(field::EMAIL),
        gender: raw.get_text(field::GENDER),
        discharge_destination: raw.get_text(field::DISCHARGE_DESTINATION),
        age,
        bmi,
        cholesterol,
        medication_count,
        length_of_stay,
        blood_pressure,
        diabetes,
        hypertension,
        extra_categorical: extra_categorical(raw),
    })
}

fn numeric(raw: &RawRecord, field: &'static str, bound: Bound) -> Result<f64, ValidationError> {
    let value = match raw.get(field).ok_or(ValidationError::Missing { field })? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
    .ok_or(ValidationError::NotNumeric { field })?;

    match bound {
        Bound::Positive if value <= 0.0 => Err(ValidationError::OutOfRange {
            field,
            reason: "must be greater than 0".to_string(),
        }),
        Bound::NonNegative if value < 0.0 => Err(ValidationError::OutOfRange {
            field,
            reason: "must not be negative".to_string(),
        }),
        _ => Ok(value),
    }
}

fn blood_pressure(raw: &RawRecord) -> Result<BloodPressure, ValidationError> {
    match raw.get(field::BLOOD_PRESSURE) {
        Some(Value::String(s)) => s.parse(),
        None => Err(ValidationError::Missing {
            field: field::BLOOD_PRESSURE,
        }),
        Some(_) => Err(ValidationError::BloodPressureFormat {
            field: field::BLOOD_PRESSURE,
        }),
    }
}

fn yes_no(raw: &RawRecord, field: &'static str) -> Result<u8, ValidationError> {
    let invalid = ValidationError::InvalidFlag { field };
    match raw.get(field).ok_or(ValidationError::Missing { field })? {
        Value::Bool(b) => Ok(u8::from(*b)),
        Value::Number(n) => match n.as_f64().filter(|v| v.is_finite()).map(f64::trunc) {
            Some(v) if v == 0.0 => Ok(0),
            Some(v) if v == 1.0 => Ok(1),
            _ => Err(invalid),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(1),
            "no" | "false" | "0" => Ok(0),
            _ => Err(invalid),
        },
        _ => Err(invalid),
    }
}

fn extra_categorical(raw: &RawRecord) -> BTreeMap<String, String> {
    raw.iter()
        .filter(|(key, _)| !MODEL_FIELDS.contains(key) && !IDENTITY_FIELDS.contains(key))
        .filter_map(|(key, value)| match value {
            Value::String(s) if !s.trim().is_empty() => {
                Some((key.to_string(), s.trim().to_string()))
            }
            _ => None,
        })
        .collect()
}
