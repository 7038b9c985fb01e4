//! Scoring: embed stored postings and rank them against the skill vector.
//!
//! # Architecture
//!
//! ```text
//! score_new_rows
//!     └─► fetch rows WHERE vector IS NULL
//!             └─► WorkerPool
//!                     ├─► N workers: embed title+description, compute fit
//!                     └─► one writer: persist vector+fit per item as results
//!                         arrive (a crash mid-batch keeps completed items)
//! ```
//!
//! Per-item failures (empty text, embed failure, empty vector, dimension
//! mismatch) are logged and skipped; the batch only fails when the store
//! cannot be read at all.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domains::jobs::error::JobError;
use crate::domains::jobs::models::JobRow;
use crate::kernel::{BaseEmbeddingService, BaseJobStore, EmbedError};

/// Cosine similarity with a small epsilon so degenerate (near-zero) vectors
/// divide safely.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    dot / (na * nb + 1e-9).sqrt()
}

/// Fit in [-100, 100].
pub fn fit_score(job_vec: &[f32], skill_vec: &[f32]) -> f32 {
    cosine(job_vec, skill_vec) * 100.0
}

/// Why a single posting was skipped (non-fatal, per-item).
#[derive(Debug, Error)]
enum SkipReason {
    #[error("empty title and description")]
    EmptyText,
    #[error("failed to embed: {0}")]
    Embed(#[from] EmbedError),
    #[error("empty vector returned")]
    EmptyVector,
    #[error("empty skill vector")]
    EmptySkillVector,
    #[error("vector dimension mismatch: job={job}, skill={skill}")]
    DimensionMismatch { job: usize, skill: usize },
}

struct Scored {
    vector: Vec<f32>,
    fit: f32,
}

/// The result of processing a single posting.
struct JobResult {
    job_id: String,
    outcome: Result<Scored, SkipReason>,
}

/// Concurrent scoring over a batch of postings.
pub struct WorkerPool {
    worker_count: usize,
    embedder: Arc<dyn BaseEmbeddingService>,
    skill_vec: Arc<Vec<f32>>,
    store: Arc<dyn BaseJobStore>,
}

impl WorkerPool {
    pub fn new(
        store: Arc<dyn BaseJobStore>,
        embedder: Arc<dyn BaseEmbeddingService>,
        skill_vec: Arc<Vec<f32>>,
        worker_count: usize,
    ) -> Self {
        Self {
            worker_count: worker_count.max(1),
            embedder,
            skill_vec,
            store,
        }
    }

    /// Process a batch across the worker pool; results are persisted
    /// individually by a single serializing writer.
    pub async fn process_jobs_concurrently(
        &self,
        rows: Vec<JobRow>,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        if rows.is_empty() {
            return Ok(());
        }

        let total = rows.len();
        info!(
            total_jobs = total,
            workers = self.worker_count,
            "Starting concurrent job processing"
        );

        let (job_tx, job_rx) = mpsc::channel::<JobRow>(self.worker_count);
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(self.worker_count);
        // Workers share one receiving end of the work queue
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let embedder = Arc::clone(&self.embedder);
            let skill_vec = Arc::clone(&self.skill_vec);
            let cancel = cancel.clone();

            workers.push(tokio::spawn(async move {
                debug!(worker_id, "Worker started");
                loop {
                    let row = {
                        let mut rx = job_rx.lock().await;
                        tokio::select! {
                            row = rx.recv() => row,
                            _ = cancel.cancelled() => None,
                        }
                    };
                    let Some(row) = row else { break };

                    let result = process_job(embedder.as_ref(), &skill_vec, row, &cancel).await;
                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
                debug!(worker_id, "Worker finished");
            }));
        }
        // The writer loop below must see the channel close once workers finish
        drop(result_tx);

        let feeder_cancel = cancel.clone();
        let feeder = tokio::spawn(async move {
            for (queued, row) in rows.into_iter().enumerate() {
                tokio::select! {
                    sent = job_tx.send(row) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                    _ = feeder_cancel.cancelled() => {
                        warn!(queued, "Cancelled while queueing jobs");
                        break;
                    }
                }
            }
        });

        // Single serializing writer: the only task touching the store, so no
        // two updates race on the same row.
        let mut processed = 0usize;
        let mut errors = 0usize;
        while let Some(result) = result_rx.recv().await {
            processed += 1;

            match result.outcome {
                Err(skip) => {
                    errors += 1;
                    warn!(job_id = %result.job_id, error = %skip, "Job processing failed");
                }
                Ok(scored) => {
                    if let Err(err) = self
                        .store
                        .update_vector_and_fit(&result.job_id, &scored.vector, scored.fit)
                        .await
                    {
                        errors += 1;
                        error!(
                            job_id = %result.job_id,
                            error = %err,
                            "Failed to update job in database"
                        );
                    }
                }
            }

            if processed % 50 == 0 {
                info!(processed, total, errors, "Processing progress");
            }
        }

        for worker in workers {
            let _ = worker.await;
        }
        let _ = feeder.await;

        info!(
            total_jobs = total,
            processed,
            errors,
            "Concurrent job processing completed"
        );

        Ok(())
    }
}

async fn process_job(
    embedder: &dyn BaseEmbeddingService,
    skill_vec: &[f32],
    row: JobRow,
    cancel: &CancellationToken,
) -> JobResult {
    let job_id = row.id;

    // Title and description together form the embedding input
    let text = format!("{} {}", row.title, row.description);
    if text.trim().is_empty() {
        return JobResult {
            job_id,
            outcome: Err(SkipReason::EmptyText),
        };
    }

    let vector = match embedder.embed(&text, cancel).await {
        Ok(vector) => vector,
        Err(err) => {
            return JobResult {
                job_id,
                outcome: Err(err.into()),
            }
        }
    };

    if vector.is_empty() {
        return JobResult {
            job_id,
            outcome: Err(SkipReason::EmptyVector),
        };
    }
    if skill_vec.is_empty() {
        return JobResult {
            job_id,
            outcome: Err(SkipReason::EmptySkillVector),
        };
    }
    if vector.len() != skill_vec.len() {
        return JobResult {
            job_id,
            outcome: Err(SkipReason::DimensionMismatch {
                job: vector.len(),
                skill: skill_vec.len(),
            }),
        };
    }

    let fit = fit_score(&vector, skill_vec);
    JobResult {
        job_id,
        outcome: Ok(Scored { vector, fit }),
    }
}

/// Score every stored posting still missing a vector.
pub async fn score_new_rows(
    store: Arc<dyn BaseJobStore>,
    embedder: Arc<dyn BaseEmbeddingService>,
    skill_vec: Arc<Vec<f32>>,
    worker_count: usize,
    cancel: &CancellationToken,
) -> Result<(), JobError> {
    let rows = store.fetch_rows_needing_vector().await?;

    if rows.is_empty() {
        info!("No jobs need vector processing");
        return Ok(());
    }

    info!(count = rows.len(), "Jobs requiring vector processing");

    let total = rows.len();
    let pool = WorkerPool::new(store, embedder, skill_vec, worker_count);

    let start = Instant::now();
    pool.process_jobs_concurrently(rows, cancel).await?;

    info!(
        total_jobs = total,
        duration_ms = start.elapsed().as_millis() as u64,
        "Completed scoring process"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MemoryJobStore, MockEmbeddingService};

    #[test]
    fn test_cosine_identical_vectors() {
        assert!((cosine(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_zero_vector_is_finite() {
        let result = cosine(&[0.0, 0.0], &[0.0, 0.0]);
        assert!(result.is_finite());
        assert!(result.abs() < 0.001);
    }

    #[test]
    fn test_fit_score_scales_to_hundred() {
        assert!((fit_score(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 100.0).abs() < 0.1);
        assert!((fit_score(&[1.0, 0.0], &[-1.0, 0.0]) + 100.0).abs() < 0.1);
    }

    fn unscored_row(id: &str, title: &str, description: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            source: "remotive".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            ..JobRow::default()
        }
    }

    #[tokio::test]
    async fn test_score_new_rows_skips_bad_items_without_failing() {
        let mut rows = vec![unscored_row("job-empty", "", "")];
        for i in 0..9 {
            rows.push(unscored_row(
                &format!("job-{i}"),
                "Engineer",
                "Builds systems",
            ));
        }

        let store = Arc::new(MemoryJobStore::with_rows(rows));
        let embedder = Arc::new(MockEmbeddingService::new(vec![1.0, 0.0, 0.0]));
        let skill_vec = Arc::new(vec![1.0, 0.0, 0.0]);

        score_new_rows(
            store.clone(),
            embedder,
            skill_vec,
            4,
            &CancellationToken::new(),
        )
        .await
        .expect("batch should not fail");

        // Nine scored, the empty one skipped
        assert_eq!(store.scored_count(), 9);
        assert!(store.get("job-empty").expect("row exists").vector.is_none());

        let scored = store.get("job-0").expect("row exists");
        assert!((scored.fit_score.expect("scored") - 100.0).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_score_new_rows_skips_dimension_mismatch() {
        let rows = vec![
            unscored_row("job-a", "Engineer", "desc"),
            unscored_row("job-b", "Engineer", "desc"),
        ];
        let store = Arc::new(MemoryJobStore::with_rows(rows));
        // Embedder returns 2-d vectors against a 3-d skill vector
        let embedder = Arc::new(MockEmbeddingService::new(vec![1.0, 0.0]));
        let skill_vec = Arc::new(vec![1.0, 0.0, 0.0]);

        score_new_rows(
            store.clone(),
            embedder,
            skill_vec,
            2,
            &CancellationToken::new(),
        )
        .await
        .expect("batch should not fail");

        assert_eq!(store.scored_count(), 0);
    }

    #[tokio::test]
    async fn test_score_new_rows_noop_when_everything_scored() {
        let store = Arc::new(MemoryJobStore::new());
        let embedder = Arc::new(MockEmbeddingService::new(vec![1.0]));

        score_new_rows(
            store.clone(),
            embedder.clone(),
            Arc::new(vec![1.0]),
            2,
            &CancellationToken::new(),
        )
        .await
        .expect("noop should succeed");

        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_scored_rows_emit_notifications() {
        let store = Arc::new(MemoryJobStore::with_rows(vec![unscored_row(
            "job-0",
            "Engineer",
            "desc",
        )]));
        let embedder = Arc::new(MockEmbeddingService::new(vec![1.0, 0.0]));

        score_new_rows(
            store.clone(),
            embedder,
            Arc::new(vec![0.0, 1.0]),
            1,
            &CancellationToken::new(),
        )
        .await
        .expect("batch should not fail");

        let notifications = store.notifications();
        assert_eq!(
            notifications,
            vec![("job_scored".to_string(), "job-0".to_string())]
        );
    }
}
