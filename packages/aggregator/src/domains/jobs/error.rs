//! Typed errors for the jobs pipeline.
//!
//! Uses `thiserror` so callers can match on the readiness gate and
//! total-failure cases; per-item and per-source failures are absorbed and
//! logged where they occur, never surfaced through these types.

use thiserror::Error;

use crate::kernel::EmbedError;

/// Errors surfaced by the pipeline entry points.
#[derive(Debug, Error)]
pub enum JobError {
    /// Initialization has not finished; callers should retry later.
    #[error("service warming up, please try again soon")]
    WarmingUp,

    /// Every attempted source failed; nothing could be fetched at all.
    #[error("all requested sources failed to return postings")]
    AllSourcesFailed,

    /// The store could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The detached persistence deadline elapsed before the write finished.
    #[error("store operation timed out")]
    StoreTimeout,

    /// An embedding call failed after exhausting retries (skill-vector load
    /// at startup, or a single scoring item).
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),

    /// The skills file could not be read or parsed at startup.
    #[error("failed to load skill vector: {0}")]
    Skills(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, JobError>;
