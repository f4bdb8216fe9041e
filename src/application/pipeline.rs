//! Scoring pipeline: the six stages wired over one set of frozen artifacts.
//!
//! Loaded once at startup, then shared read-only (`Arc<ScoringPipeline>`)
//! between any number of concurrent callers.

use std::sync::Arc;

use crate::domain::patient::field;
use crate::domain::{
    EncodingTable, FeatureVector, Imputer, PatientRecord, RawRecord, Scaler, ScoredPatient,
    ScoringResult, TrainingSchema, UnseenCategory, ValidationError,
};
use crate::ports::{ArtifactStore, Classifier};

use super::aligner::align;
use super::deriver::derive_features;
use super::encoder::CategoricalEncoder;
use super::normalizer::normalize;
use super::preprocess::Preprocessor;
use super::scorer::Scorer;

/// End-to-end scoring over frozen artifacts.
#[derive(Debug)]
pub struct ScoringPipeline {
    schema: TrainingSchema,
    encoder: CategoricalEncoder,
    preprocessor: Preprocessor,
    scorer: Scorer,
}

/// Intermediate products of one record's trip through the pipeline.
struct Prepared {
    record: PatientRecord,
    vector: FeatureVector,
    unseen: Vec<UnseenCategory>,
}

impl ScoringPipeline {
    /// Load every artifact from `store` and cross-check them.
    ///
    /// # Errors
    /// Any missing or corrupt artifact, or any artifact whose width or column
    /// names disagree with the training columns.
    pub fn load<S: ArtifactStore + ?Sized>(store: &S) -> crate::Result<Self> {
        tracing::info!(store = %store.describe(), "Loading scoring artifacts...");
        let pipeline = Self::from_artifacts(
            store.load_training_columns()?,
            store.load_encoders()?,
            store.load_imputer()?,
            store.load_scaler()?,
            store.load_classifier()?,
        )?;
        tracing::info!(
            columns = pipeline.schema.len(),
            encoders = pipeline.encoder.table().len(),
            classifier = pipeline.scorer.classifier().kind(),
            "Scoring pipeline ready"
        );
        Ok(pipeline)
    }

    /// Assemble a pipeline from already-loaded artifacts.
    ///
    /// # Errors
    /// Returns `SchemaMismatch` when an artifact disagrees with `columns`.
    pub fn from_artifacts(
        columns: Vec<String>,
        encoders: EncodingTable,
        imputer: Imputer,
        scaler: Scaler,
        classifier: Box<dyn Classifier>,
    ) -> crate::Result<Self> {
        let schema = TrainingSchema::new(columns)?;
        schema.check_artifact("imputer", imputer.width(), imputer.feature_names.as_deref())?;
        schema.check_artifact("scaler", scaler.width(), scaler.feature_names.as_deref())?;
        schema.check_artifact(
            "classifier",
            classifier.feature_names().len(),
            Some(classifier.feature_names()),
        )?;

        Ok(Self {
            schema,
            encoder: CategoricalEncoder::new(Arc::new(encoders)),
            preprocessor: Preprocessor::new(imputer, scaler),
            scorer: Scorer::new(classifier),
        })
    }

    #[must_use]
    pub fn schema(&self) -> &TrainingSchema {
        &self.schema
    }

    #[must_use]
    pub fn encoders(&self) -> &EncodingTable {
        self.encoder.table()
    }

    #[must_use]
    pub fn classifier_kind(&self) -> &'static str {
        self.scorer.classifier().kind()
    }

    fn prepare(&self, raw: &RawRecord) -> crate::Result<Prepared> {
        let record = normalize(raw)?;
        let frame = derive_features(&record);
        let (encoded, unseen) = self.encoder.encode(frame);
        let aligned = align(&self.schema, &encoded);
        let vector = self.preprocessor.apply(aligned)?;
        if let Some((column, _)) = vector.iter().find(|(_, v)| !v.is_finite()) {
            tracing::warn!(column, "record rejected: derived feature is not finite");
            return Err(ValidationError::NonFiniteFeature {
                column: column.to_string(),
            }
            .into());
        }
        Ok(Prepared {
            record,
            vector,
            unseen,
        })
    }

    /// Score one raw record.
    ///
    /// # Errors
    /// `Validation` for a malformed record; `SchemaMismatch` or `Model` for
    /// internal faults.
    pub fn score(&self, raw: &RawRecord) -> crate::Result<ScoringResult> {
        let prepared = self.prepare(raw)?;
        let result = self.scorer.score(&prepared.vector)?;
        Ok(result.with_unseen(prepared.unseen))
    }

    /// Score one raw record and keep the normalized record alongside.
    ///
    /// The result gets a fresh id. `doctor_id` is the caller identity from
    /// the auth collaborator; any `id` or `doctor_id` in the record body is
    /// ignored.
    ///
    /// # Errors
    /// Same as [`Self::score`].
    pub fn score_patient(
        &self,
        raw: &RawRecord,
        doctor_id: Option<&str>,
    ) -> crate::Result<ScoredPatient> {
        let prepared = self.prepare(raw)?;
        let result = self
            .scorer
            .score(&prepared.vector)?
            .with_unseen(prepared.unseen);

        let scored = ScoredPatient::new(prepared.record, result);
        Ok(match doctor_id {
            Some(doctor) => scored.with_doctor(doctor),
            None => scored,
        })
    }

    /// The preprocessed vector that would be handed to the classifier.
    ///
    /// # Errors
    /// Same as [`Self::score`], minus model errors.
    pub fn features(&self, raw: &RawRecord) -> crate::Result<FeatureVector> {
        Ok(self.prepare(raw)?.vector)
    }

    /// Apply `updates` to `existing` and score the merged record.
    ///
    /// Only the updatable patient fields are taken from `updates`. The stored
    /// `id` and `doctor_id` of `existing` are kept; `doctor_id` is only used
    /// when `existing` has no doctor recorded.
    ///
    /// # Errors
    /// `Validation(NoUpdatableFields)` when `updates` carries none of them,
    /// otherwise as [`Self::score_patient`].
    pub fn rescore(
        &self,
        existing: &RawRecord,
        updates: &RawRecord,
        doctor_id: Option<&str>,
    ) -> crate::Result<ScoredPatient> {
        let merged = existing.merged_with(updates)?;
        tracing::debug!(fields = updates.len(), "Re-scoring updated record");

        let owner = existing.get_text(field::DOCTOR_ID);
        let mut scored = self.score_patient(&merged, owner.as_deref().or(doctor_id))?;
        if let Some(id) = existing.get_text(field::ID) {
            scored.id = id;
        }
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FsArtifactStore, SignaturePolicy};
    use crate::domain::{column, ValidationError, DECISION_THRESHOLD};
    use crate::ReadmitError;
    use serde_json::json;

    fn pipeline() -> ScoringPipeline {
        let store = FsArtifactStore::open("models", &SignaturePolicy::unsigned())
            .expect("reference artifacts");
        ScoringPipeline::load(&store).expect("reference artifacts are consistent")
    }

    fn high_risk() -> RawRecord {
        serde_json::from_value(json!({
            "age": 75,
            "bmi": 32,
            "cholesterol": 250,
            "blood_pressure": "150/95",
            "diabetes": "Yes",
            "hypertension": "Yes",
            "medication_count": 6,
            "length_of_stay": 20,
            "discharge_destination": "SNF",
            "gender": "Male"
        }))
        .expect("object")
    }

    fn low_risk() -> RawRecord {
        serde_json::from_value(json!({
            "age": "40",
            "bmi": "22",
            "cholesterol": "180",
            "blood_pressure": "118/76",
            "diabetes": "No",
            "hypertension": "No",
            "medication_count": "1",
            "length_of_stay": "3",
            "discharge_destination": "Home",
            "gender": "Female"
        }))
        .expect("object")
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScoringPipeline>();
        assert_send_sync::<Arc<ScoringPipeline>>();
    }

    #[test]
    fn test_end_to_end_high_risk_record() {
        let pipeline = pipeline();
        let raw = high_risk();

        let record = normalize(&raw).expect("valid");
        let frame = derive_features(&record);
        assert_eq!(frame.numeric(column::HIGH_RISK_AGE), Some(1.0));
        assert_eq!(frame.numeric(column::POLYPHARMACY), Some(1.0));
        assert_eq!(frame.numeric(column::LONG_STAY), Some(1.0));
        assert_eq!(frame.numeric(column::HIGH_CHOLESTEROL), Some(1.0));
        assert_eq!(frame.numeric(column::MULTI_COMORBIDITY), Some(1.0));

        let result = pipeline.score(&raw).expect("scores");
        assert!((0.0..=1.0).contains(&result.probability));
        assert_eq!(result.readmitted, result.probability >= DECISION_THRESHOLD);
        assert!(result.readmitted);
        assert!(result.unseen_categories.is_empty());
    }

    #[test]
    fn test_low_risk_record() {
        let result = pipeline().score(&low_risk()).expect("scores");
        assert!(!result.readmitted);
        assert!(result.probability < DECISION_THRESHOLD);
    }

    #[test]
    fn test_features_follow_training_columns() {
        let pipeline = pipeline();
        let vector = pipeline.features(&high_risk()).expect("features");
        assert_eq!(vector.columns(), pipeline.schema().columns());
        assert!(vector.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unseen_category_is_a_note_not_an_error() {
        let raw = high_risk().with("gender", "Nonbinary").with("discharge_destination", "Hospice");
        let result = pipeline().score(&raw).expect("unseen values still score");
        let columns: Vec<&str> = result
            .unseen_categories
            .iter()
            .map(|u| u.column.as_str())
            .collect();
        assert_eq!(columns, vec!["discharge_destination", "gender"]);
    }

    #[test]
    fn test_rejection_names_the_field() {
        let raw = high_risk().with("blood_pressure", "120");
        let err = pipeline().score(&raw).expect_err("bad blood pressure");
        assert!(err.is_rejection());
        assert!(err.to_string().contains("blood_pressure"));
    }

    #[test]
    fn test_score_patient_builds_row() {
        let raw = high_risk().with("email", "jane@example.org").with("age", 70.6);
        let scored = pipeline()
            .score_patient(&raw, Some("doctor-7"))
            .expect("scores");
        assert_eq!(scored.doctor_id.as_deref(), Some("doctor-7"));

        let row = scored.to_row().expect("fits integer columns");
        assert_eq!(row.age, 71);
        assert_eq!(row.diabetes, 1);
        assert_eq!(row.blood_pressure, "150/95");
        assert_eq!(row.email.as_deref(), Some("jane@example.org"));
        assert_eq!(row.readmitted, scored.result.readmitted);
    }

    #[test]
    fn test_rescore_applies_updates() {
        let pipeline = pipeline();
        let existing = low_risk().with("id", "p-1").with("doctor_id", "d-1");
        let before = pipeline.score_patient(&existing, None).expect("scores");

        let updates = RawRecord::new().with("age", 82).with("readmitted", true);
        let after = pipeline.rescore(&existing, &updates, None).expect("rescore");

        assert_eq!(after.id, "p-1");
        assert_eq!(after.doctor_id.as_deref(), Some("d-1"));
        assert_eq!(after.record.age, 82.0);
        assert!(after.result.probability > before.result.probability);
    }

    #[test]
    fn test_score_patient_ignores_identity_in_body() {
        let raw = high_risk().with("id", "p-forged").with("doctor_id", "d-forged");
        let scored = pipeline().score_patient(&raw, Some("d-auth")).expect("scores");
        assert_ne!(scored.id, "p-forged");
        assert_eq!(scored.doctor_id.as_deref(), Some("d-auth"));

        let scored = pipeline().score_patient(&raw, None).expect("scores");
        assert!(scored.doctor_id.is_none());
    }

    #[test]
    fn test_rescore_keeps_stored_owner() {
        let pipeline = pipeline();
        let updates = RawRecord::new().with("bmi", 24.0);

        let existing = low_risk().with("id", "p-2").with("doctor_id", "d-1");
        let after = pipeline
            .rescore(&existing, &updates, Some("d-2"))
            .expect("rescore");
        assert_eq!(after.id, "p-2");
        assert_eq!(after.doctor_id.as_deref(), Some("d-1"));

        let after = pipeline
            .rescore(&low_risk(), &updates, Some("d-2"))
            .expect("rescore");
        assert_eq!(after.doctor_id.as_deref(), Some("d-2"));
    }

    #[test]
    fn test_extreme_blood_pressure_is_rejected_not_panicking() {
        let raw = high_risk().with("blood_pressure", "9223372036854775807/-1");
        let err = pipeline().score(&raw).expect_err("implausible reading");
        assert!(matches!(
            err,
            ReadmitError::Validation(ValidationError::OutOfRange {
                field: "blood_pressure",
                ..
            })
        ));
    }

    #[test]
    fn test_overflowing_interaction_terms_are_rejected() {
        let pipeline = pipeline();
        let raw = high_risk().with("age", 1e200).with("bmi", 1e200);
        let err = pipeline.score(&raw).expect_err("age_bmi overflows");
        assert!(err.is_rejection());
        assert!(matches!(
            err,
            ReadmitError::Validation(ValidationError::NonFiniteFeature { ref column })
                if column == "age_bmi"
        ));
        assert!(pipeline.features(&raw).is_err());
    }

    #[test]
    fn test_rescore_without_updatable_fields() {
        let updates = RawRecord::new().with("readmitted", true);
        let err = pipeline()
            .rescore(&low_risk(), &updates, None)
            .expect_err("nothing to update");
        assert!(matches!(
            err,
            ReadmitError::Validation(ValidationError::NoUpdatableFields)
        ));
    }

    #[test]
    fn test_mismatched_artifacts_rejected() {
        let store = FsArtifactStore::open("models", &SignaturePolicy::unsigned())
            .expect("reference artifacts");
        let mut columns = store.load_training_columns().expect("columns");
        columns.pop();
        let err = ScoringPipeline::from_artifacts(
            columns,
            store.load_encoders().expect("encoders"),
            store.load_imputer().expect("imputer"),
            store.load_scaler().expect("scaler"),
            store.load_classifier().expect("classifier"),
        )
        .expect_err("narrower schema");
        assert!(matches!(err, ReadmitError::SchemaMismatch(_)));
    }

    #[test]
    fn test_concurrent_scoring_is_consistent() {
        let pipeline = Arc::new(pipeline());
        let expected = pipeline.score(&high_risk()).expect("scores").probability;
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&pipeline);
                std::thread::spawn(move || p.score(&high_risk()).expect("scores").probability)
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().expect("thread"), expected);
        }
    }
}
