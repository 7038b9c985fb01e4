//! Readiness gate: a process-wide switch between a fail-fast stub and the
//! live pipeline.
//!
//! Entry points read the current snapshot through `JobServiceHandle` on every
//! call. Initialization publishes a fully-constructed service exactly once;
//! because the whole `Arc` is swapped, readers never observe a
//! half-initialized pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domains::jobs::error::JobError;

/// The pipeline operations exposed to the scheduler and HTTP handlers.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Fetch from all enabled sources, then score.
    async fn fetch_and_process_jobs(&self, cancel: &CancellationToken) -> Result<(), JobError>;

    /// Fetch from the named sources (all enabled when empty) with an optional
    /// per-source result limit, then score.
    async fn fetch_and_process_jobs_from_sources(
        &self,
        sources: &[String],
        job_count: usize,
        cancel: &CancellationToken,
    ) -> Result<(), JobError>;

    /// Score every stored posting still missing a vector.
    async fn score_new_jobs(&self, cancel: &CancellationToken) -> Result<(), JobError>;
}

/// Stub wired in before initialization finishes: always fails fast, never
/// blocks the caller.
pub struct WarmingUpJobService;

#[async_trait]
impl JobService for WarmingUpJobService {
    async fn fetch_and_process_jobs(&self, _cancel: &CancellationToken) -> Result<(), JobError> {
        Err(JobError::WarmingUp)
    }

    async fn fetch_and_process_jobs_from_sources(
        &self,
        _sources: &[String],
        _job_count: usize,
        _cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        Err(JobError::WarmingUp)
    }

    async fn score_new_jobs(&self, _cancel: &CancellationToken) -> Result<(), JobError> {
        Err(JobError::WarmingUp)
    }
}

/// Clonable handle to the current pipeline snapshot.
#[derive(Clone)]
pub struct JobServiceHandle {
    inner: Arc<RwLock<Arc<dyn JobService>>>,
}

impl JobServiceHandle {
    /// A handle in the warming-up state.
    pub fn warming_up() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(WarmingUpJobService))),
        }
    }

    /// The current snapshot, cloned out so callers never hold the lock across
    /// pipeline work.
    pub async fn get(&self) -> Arc<dyn JobService> {
        self.inner.read().await.clone()
    }

    /// Publish the live pipeline. Called once, after initialization; the
    /// transition is one-way for the process lifetime.
    pub async fn publish(&self, service: Arc<dyn JobService>) {
        *self.inner.write().await = service;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJobService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobService for CountingJobService {
        async fn fetch_and_process_jobs(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<(), JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch_and_process_jobs_from_sources(
            &self,
            _sources: &[String],
            _job_count: usize,
            _cancel: &CancellationToken,
        ) -> Result<(), JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn score_new_jobs(&self, _cancel: &CancellationToken) -> Result<(), JobError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_warming_up_fails_fast_on_every_entry_point() {
        let handle = JobServiceHandle::warming_up();
        let cancel = CancellationToken::new();

        let service = handle.get().await;
        assert!(matches!(
            service.fetch_and_process_jobs(&cancel).await,
            Err(JobError::WarmingUp)
        ));
        assert!(matches!(
            service
                .fetch_and_process_jobs_from_sources(&[], 0, &cancel)
                .await,
            Err(JobError::WarmingUp)
        ));
        assert!(matches!(
            service.score_new_jobs(&cancel).await,
            Err(JobError::WarmingUp)
        ));
    }

    #[tokio::test]
    async fn test_publish_flips_the_handle_to_the_live_service() {
        let handle = JobServiceHandle::warming_up();
        let cancel = CancellationToken::new();

        let live = Arc::new(CountingJobService {
            calls: AtomicUsize::new(0),
        });
        handle.publish(live.clone()).await;

        // Clones made before the publish observe it too
        let cloned = handle.clone();
        cloned
            .get()
            .await
            .fetch_and_process_jobs(&cancel)
            .await
            .expect("live service should succeed");

        assert_eq!(live.calls.load(Ordering::SeqCst), 1);
    }
}
