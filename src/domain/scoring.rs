//! Scoring results and the persistence-ready patient row.

use serde::{Deserialize, Serialize};

use super::patient::field;
use super::{PatientRecord, ValidationError};

/// Probability at or above which a patient is flagged for readmission.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Probability at or above which reporting places a patient in the high-risk
/// tier. Independent of [`DECISION_THRESHOLD`]; do not merge the two.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Reporting tier for a readmission probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Below the decision threshold
    Low,
    /// Flagged for readmission, below the high-risk threshold
    Elevated,
    /// At or above the high-risk threshold
    High,
}

impl RiskLevel {
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            Self::High
        } else if probability >= DECISION_THRESHOLD {
            Self::Elevated
        } else {
            Self::Low
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - routine discharge follow-up",
            Self::Elevated => "Elevated risk - readmission predicted, schedule follow-up",
            Self::High => "High risk - prioritize for transitional care",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Elevated => write!(f, "ELEVATED"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// A categorical value that was not among the learned classes and was
/// encoded as the fallback class instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnseenCategory {
    pub column: String,
    pub value: String,
}

/// Output of the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Positive-class (readmission) probability in `[0, 1]`
    pub probability: f64,

    /// `probability >= DECISION_THRESHOLD`
    pub readmitted: bool,

    pub risk_level: RiskLevel,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unseen_categories: Vec<UnseenCategory>,
}

impl ScoringResult {
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            readmitted: probability >= DECISION_THRESHOLD,
            risk_level: RiskLevel::from_probability(probability),
            unseen_categories: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_unseen(mut self, unseen: Vec<UnseenCategory>) -> Self {
        self.unseen_categories = unseen;
        self
    }

    #[must_use]
    pub fn is_high_risk(&self) -> bool {
        self.risk_level == RiskLevel::High
    }
}

/// A normalized record together with its score, ready to hand to the
/// persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPatient {
    pub id: String,

    /// Caller identity resolved by the auth collaborator, if any.
    pub doctor_id: Option<String>,

    pub record: PatientRecord,

    pub result: ScoringResult,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ScoredPatient {
    #[must_use]
    pub fn new(record: PatientRecord, result: ScoringResult) -> Self {
        Self {
            id: uuid_v4(),
            doctor_id: None,
            record,
            result,
            created_at: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn with_doctor(mut self, doctor_id: impl Into<String>) -> Self {
        self.doctor_id = Some(doctor_id.into());
        self
    }

    /// Convert to the row shape of the `patients` table.
    ///
    /// # Errors
    /// Fails, naming the field, when a value does not fit its integer column.
    pub fn to_row(&self) -> Result<PatientRow, ValidationError> {
        let r = &self.record;
        Ok(PatientRow {
            id: self.id.clone(),
            doctor_id: self.doctor_id.clone(),
            name: r.name.clone(),
            address: r.address.clone(),
            age: round_to_i32(field::AGE, r.age)?,
            gender: r.gender.clone(),
            bmi: r.bmi,
            cholesterol: r.cholesterol,
            blood_pressure: r.blood_pressure.to_string(),
            diabetes: i32::from(r.diabetes),
            hypertension: i32::from(r.hypertension),
            medication_count: round_to_i32(field::MEDICATION_COUNT, r.medication_count)?,
            length_of_stay: round_to_i32(field::LENGTH_OF_STAY, r.length_of_stay)?,
            discharge_destination: r.discharge_destination.clone(),
            phonenumber: r.phone_number.clone(),
            email: r.email.clone(),
            readmitted: self.result.readmitted,
            readmission_probability: self.result.probability,
            created_at: self.created_at,
        })
    }
}

/// Persistence-ready patient row with integer columns already converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRow {
    pub id: String,
    pub doctor_id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub age: i32,
    pub gender: Option<String>,
    pub bmi: f64,
    pub cholesterol: f64,
    pub blood_pressure: String,
    pub diabetes: i32,
    pub hypertension: i32,
    pub medication_count: i32,
    pub length_of_stay: i32,
    pub discharge_destination: Option<String>,
    pub phonenumber: Option<String>,
    pub email: Option<String>,
    pub readmitted: bool,
    pub readmission_probability: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Round half to even (banker's rounding), then check the `i32` range.
fn round_to_i32(field: &'static str, value: f64) -> Result<i32, ValidationError> {
    let rounded = value.round_ties_even();
    if !rounded.is_finite() || rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        tracing::warn!(field, "value does not fit integer column");
        return Err(ValidationError::OutOfRange {
            field,
            reason: "does not fit an integer column".to_string(),
        });
    }
    Ok(rounded as i32)
}

/// Generate a random UUID v4 using CSPRNG.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
