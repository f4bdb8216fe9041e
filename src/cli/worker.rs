//! Threaded batch worker.
//!
//! N threads share one read-only pipeline, claim record indices from an
//! atomic counter and report each result over a channel. The handle
//! reassembles results in input order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::RecordOutput;
use crate::application::ScoringPipeline;
use crate::domain::RawRecord;

/// What to do with each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchJob {
    Score { doctor_id: Option<String> },
    Features,
}

/// Progress updates from the batch workers.
#[derive(Debug, Clone)]
pub enum ScoringProgress {
    /// One record finished (scored, vectorized or rejected)
    Record(RecordOutput),
    /// A worker ran out of records
    WorkerDone { worker: usize, processed: usize },
}

/// Handle to a running batch.
pub struct BatchHandle {
    /// Receiver for progress updates
    pub progress_rx: Receiver<ScoringProgress>,
    total: usize,
    handles: Vec<JoinHandle<()>>,
}

impl BatchHandle {
    /// Block until every worker is done and return the outputs in input order.
    ///
    /// A record whose worker died without reporting is returned as rejected.
    #[must_use]
    pub fn collect(self) -> Vec<RecordOutput> {
        let mut slots: Vec<Option<RecordOutput>> = vec![None; self.total];
        for progress in self.progress_rx.iter() {
            match progress {
                ScoringProgress::Record(output) => {
                    let index = output.index();
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(output);
                    }
                }
                ScoringProgress::WorkerDone { worker, processed } => {
                    tracing::debug!(worker, processed, "Batch worker finished");
                }
            }
        }
        for handle in self.handles {
            if handle.join().is_err() {
                tracing::error!("Batch worker panicked");
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| RecordOutput::Rejected {
                    index,
                    error: "record was not processed".to_string(),
                    field: None,
                })
            })
            .collect()
    }
}

/// Spawns the batch threads.
pub struct BatchWorker;

impl BatchWorker {
    /// Start `workers` threads over `records`. At least one thread is started;
    /// never more than there are records.
    pub fn spawn(
        pipeline: Arc<ScoringPipeline>,
        records: Vec<RawRecord>,
        job: BatchJob,
        workers: usize,
    ) -> BatchHandle {
        let total = records.len();
        let records = Arc::new(records);
        let job = Arc::new(job);
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let count = workers.clamp(1, total.max(1));
        tracing::info!(records = total, workers = count, "Starting batch");

        let handles = (0..count)
            .map(|worker| {
                let pipeline = Arc::clone(&pipeline);
                let records = Arc::clone(&records);
                let job = Arc::clone(&job);
                let next = Arc::clone(&next);
                let tx = tx.clone();
                thread::spawn(move || {
                    Self::run_worker(worker, &pipeline, &records, &job, &next, &tx);
                })
            })
            .collect();

        BatchHandle {
            progress_rx: rx,
            total,
            handles,
        }
    }

    fn run_worker(
        worker: usize,
        pipeline: &ScoringPipeline,
        records: &[RawRecord],
        job: &BatchJob,
        next: &AtomicUsize,
        tx: &Sender<ScoringProgress>,
    ) {
        let mut processed = 0usize;
        loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            let Some(raw) = records.get(index) else {
                break;
            };
            let output = process(pipeline, job, index, raw);
            processed += 1;
            if tx.send(ScoringProgress::Record(output)).is_err() {
                return;
            }
        }
        let _ = tx.send(ScoringProgress::WorkerDone { worker, processed });
    }
}

/// Run one record through the pipeline.
#[must_use]
pub fn process(
    pipeline: &ScoringPipeline,
    job: &BatchJob,
    index: usize,
    raw: &RawRecord,
) -> RecordOutput {
    let outcome = match job {
        BatchJob::Score { doctor_id } => pipeline
            .score_patient(raw, doctor_id.as_deref())
            .and_then(|scored| {
                let row = scored.to_row()?;
                Ok(RecordOutput::Scored {
                    index,
                    row,
                    risk_level: scored.result.risk_level,
                    unseen_categories: scored.result.unseen_categories,
                })
            }),
        BatchJob::Features => pipeline
            .features(raw)
            .map(|features| RecordOutput::Features { index, features }),
    };
    outcome.unwrap_or_else(|err| {
        if !err.is_rejection() {
            tracing::error!(index, error = %err, "Record failed inside the pipeline");
        }
        RecordOutput::rejected(index, &err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FsArtifactStore, SignaturePolicy};
    use serde_json::json;

    fn pipeline() -> Arc<ScoringPipeline> {
        let store = FsArtifactStore::open("models", &SignaturePolicy::unsigned())
            .expect("reference artifacts");
        Arc::new(ScoringPipeline::load(&store).expect("pipeline"))
    }

    fn record(age: u32) -> RawRecord {
        serde_json::from_value(json!({
            "age": age,
            "bmi": 27.5,
            "cholesterol": 210,
            "blood_pressure": "130/85",
            "diabetes": "No",
            "hypertension": "Yes",
            "medication_count": 3,
            "length_of_stay": 5,
            "discharge_destination": "Home",
            "gender": "Female"
        }))
        .expect("object")
    }

    #[test]
    fn test_results_in_input_order_with_rejections() {
        let mut records: Vec<RawRecord> = (0..20).map(|i| record(40 + i)).collect();
        records[7] = record(50).with("blood_pressure", "130");

        let outputs = BatchWorker::spawn(
            pipeline(),
            records,
            BatchJob::Score {
                doctor_id: Some("d-1".into()),
            },
            4,
        )
        .collect();

        assert_eq!(outputs.len(), 20);
        for (i, output) in outputs.iter().enumerate() {
            assert_eq!(output.index(), i);
        }
        assert!(outputs[7].is_rejected());
        assert_eq!(outputs.iter().filter(|o| o.is_rejected()).count(), 1);
        match &outputs[3] {
            RecordOutput::Scored { row, .. } => {
                assert_eq!(row.age, 43);
                assert_eq!(row.doctor_id.as_deref(), Some("d-1"));
            }
            other => panic!("expected a scored row, got {other:?}"),
        }
        match &outputs[7] {
            RecordOutput::Rejected { field, .. } => assert_eq!(*field, Some("blood_pressure")),
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_single_worker_survives_implausible_reading() {
        let records = vec![
            record(50).with("blood_pressure", "9223372036854775807/-1"),
            record(60),
            record(70),
        ];
        let outputs =
            BatchWorker::spawn(pipeline(), records, BatchJob::Score { doctor_id: None }, 1)
                .collect();
        assert!(outputs[0].is_rejected());
        assert!(outputs[1..].iter().all(|o| !o.is_rejected()));
    }

    #[test]
    fn test_features_job_and_empty_batch() {
        let pipeline = pipeline();
        let outputs =
            BatchWorker::spawn(Arc::clone(&pipeline), vec![record(60)], BatchJob::Features, 8)
                .collect();
        match &outputs[0] {
            RecordOutput::Features { features, .. } => {
                assert_eq!(features.len(), pipeline.schema().len());
            }
            other => panic!("expected features, got {other:?}"),
        }

        let outputs = BatchWorker::spawn(pipeline, Vec::new(), BatchJob::Features, 2).collect();
        assert!(outputs.is_empty());
    }
}
