// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Naming convention: Base* for trait names (e.g., BaseEmbeddingService)

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domains::jobs::models::JobRow;
use crate::kernel::embedder::EmbedError;

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Generate an embedding vector for text.
    ///
    /// The token aborts the call (including backoff waits between retries);
    /// callers doing detached background work pass a fresh token so an
    /// unrelated deadline cannot cut them off.
    async fn embed(&self, text: &str, cancel: &CancellationToken)
        -> Result<Vec<f32>, EmbedError>;
}

/// The store operations the pipeline depends on.
#[async_trait]
pub trait BaseJobStore: Send + Sync {
    /// Idempotent batched upsert; returns the count of newly inserted rows.
    async fn upsert_jobs(&self, rows: &[JobRow]) -> sqlx::Result<usize>;

    /// All postings still missing a vector.
    async fn fetch_rows_needing_vector(&self) -> sqlx::Result<Vec<JobRow>>;

    /// Persist a posting's vector and fit score together.
    async fn update_vector_and_fit(
        &self,
        id: &str,
        vector: &[f32],
        fit_score: f32,
    ) -> sqlx::Result<()>;

    async fn ping(&self) -> sqlx::Result<()>;
}
