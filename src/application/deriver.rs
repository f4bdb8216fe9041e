//! Feature deriver: engineered clinical features from a normalized record.

use crate::domain::patient::field;
use crate::domain::{column, FeatureFrame, PatientRecord};

/// Cholesterol above this (mg/dL) is flagged high.
const HIGH_CHOLESTEROL_ABOVE: f64 = 200.0;
/// Age at or above this is flagged high-risk.
const HIGH_RISK_AGE_FROM: f64 = 70.0;
/// Medication count at or above this is polypharmacy.
const POLYPHARMACY_FROM: f64 = 5.0;
/// Stays longer than this (days) are long stays.
const LONG_STAY_ABOVE: f64 = 14.0;

/// BMI category: 0 underweight, 1 normal, 2 overweight, 3 otherwise.
///
/// The bounded branches are closed intervals, so values falling between them
/// (24.95, 29.95) end up in category 3.
#[must_use]
pub fn bmi_category(bmi: f64) -> f64 {
    if bmi < 18.5 {
        0.0
    } else if (18.5..=24.9).contains(&bmi) {
        1.0
    } else if (25.0..=29.9).contains(&bmi) {
        2.0
    } else {
        3.0
    }
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Compute the working feature set for one record.
///
/// Keeps the normalized numeric originals, replaces blood pressure with its
/// systolic/diastolic/pulse-pressure parts and adds the engineered flags and
/// interactions. Categorical fields are carried through unencoded.
#[must_use]
pub fn derive_features(record: &PatientRecord) -> FeatureFrame {
    let mut frame = FeatureFrame::new();

    frame.set_numeric(field::AGE, record.age);
    frame.set_numeric(field::BMI, record.bmi);
    frame.set_numeric(field::CHOLESTEROL, record.cholesterol);
    frame.set_numeric(field::MEDICATION_COUNT, record.medication_count);
    frame.set_numeric(field::LENGTH_OF_STAY, record.length_of_stay);
    frame.set_numeric(field::DIABETES, f64::from(record.diabetes));
    frame.set_numeric(field::HYPERTENSION, f64::from(record.hypertension));

    let bp = record.blood_pressure;
    // i64 -> f64 is exact for any plausible pressure reading.
    frame.set_numeric(column::SYSTOLIC, bp.systolic as f64);
    frame.set_numeric(column::DIASTOLIC, bp.diastolic as f64);
    frame.set_numeric(column::PULSE_PRESSURE, bp.pulse_pressure() as f64);

    frame.set_numeric(column::BMI_CATEGORY, bmi_category(record.bmi));
    frame.set_numeric(
        column::HIGH_CHOLESTEROL,
        flag(record.cholesterol > HIGH_CHOLESTEROL_ABOVE),
    );
    frame.set_numeric(column::HIGH_RISK_AGE, flag(record.age >= HIGH_RISK_AGE_FROM));
    frame.set_numeric(
        column::POLYPHARMACY,
        flag(record.medication_count >= POLYPHARMACY_FROM),
    );
    frame.set_numeric(column::LONG_STAY, flag(record.length_of_stay > LONG_STAY_ABOVE));
    frame.set_numeric(
        column::MULTI_COMORBIDITY,
        flag(record.diabetes == 1 && record.hypertension == 1),
    );
    frame.set_numeric(column::AGE_BMI, record.age * record.bmi);
    frame.set_numeric(column::STAY_MEDS, record.length_of_stay * record.medication_count);

    if let Some(gender) = &record.gender {
        frame.set_categorical(field::GENDER, gender.clone());
    }
    if let Some(dest) = &record.discharge_destination {
        frame.set_categorical(field::DISCHARGE_DESTINATION, dest.clone());
    }
    for (name, value) in &record.extra_categorical {
        frame.set_categorical(name.clone(), value.clone());
    }

    tracing::trace!(
        numeric = frame.numeric_columns().count(),
        categorical = frame.categorical_columns().count(),
        "Derived features"
    );
    frame
}
