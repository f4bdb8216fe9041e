//! Domain layer: Core types of the readmission pipeline.
//!
//! Pure data and the small amount of arithmetic that belongs to it
//! (blood-pressure parsing, imputer and scaler application, thresholds).
//! No I/O happens here.

mod artifacts;
mod error;
mod features;
pub mod patient;
mod scoring;

pub use artifacts::{EncodingTable, ImputeStrategy, Imputer, LabelEncoder, Scaler, TrainingSchema};
pub use error::{SchemaMismatchError, ValidationError};
pub use features::{
    column, dummy_column, is_numeric_like, EncodedFeatures, FeatureFrame, FeatureVector,
    ENGINEERED_COLUMNS, NUMERIC_LIKE_COLUMNS,
};
pub use patient::{BloodPressure, PatientRecord, RawRecord};
pub use scoring::{
    PatientRow, RiskLevel, ScoredPatient, ScoringResult, UnseenCategory, DECISION_THRESHOLD,
    HIGH_RISK_THRESHOLD,
};
