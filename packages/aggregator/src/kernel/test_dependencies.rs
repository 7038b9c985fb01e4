// Mock implementations for testing
//
// Provides mock services that can be injected into the pipeline for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domains::jobs::models::JobRow;
use crate::kernel::{BaseEmbeddingService, BaseJobStore, EmbedError};

// =============================================================================
// Mock Embedding Service
// =============================================================================

/// Embedding service returning a fixed vector, with optional per-call
/// failure injection.
pub struct MockEmbeddingService {
    vector: Vec<f32>,
    /// Texts (exact match on the raw input) that should fail with EmptyVector
    failing_inputs: Vec<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockEmbeddingService {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            failing_inputs: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_failing_input(mut self, text: &str) -> Self {
        self.failing_inputs.push(text.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseEmbeddingService for MockEmbeddingService {
    async fn embed(
        &self,
        text: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbedError> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.failing_inputs.iter().any(|t| t == text) {
            return Err(EmbedError::EmptyVector);
        }
        Ok(self.vector.clone())
    }
}

// =============================================================================
// In-memory Job Store
// =============================================================================

/// In-memory `BaseJobStore` mirroring the idempotent-upsert semantics of the
/// PostgreSQL store.
#[derive(Default)]
pub struct MemoryJobStore {
    rows: Mutex<HashMap<String, JobRow>>,
    /// (channel, payload) pairs, in emission order
    notifications: Mutex<Vec<(String, String)>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<JobRow>) -> Self {
        let store = Self::new();
        {
            let mut map = store.rows.lock().unwrap();
            for row in rows {
                map.insert(row.id.clone(), row);
            }
        }
        store
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, id: &str) -> Option<JobRow> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn scored_count(&self) -> usize {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.vector.is_some())
            .count()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseJobStore for MemoryJobStore {
    async fn upsert_jobs(&self, rows: &[JobRow]) -> sqlx::Result<usize> {
        let mut map = self.rows.lock().unwrap();
        let mut inserted = 0;
        for row in rows {
            if map.contains_key(&row.id) {
                continue;
            }
            map.insert(row.id.clone(), row.clone());
            self.notifications
                .lock()
                .unwrap()
                .push(("new_job".to_string(), row.id.clone()));
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn fetch_rows_needing_vector(&self) -> sqlx::Result<Vec<JobRow>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.vector.is_none())
            .cloned()
            .collect())
    }

    async fn update_vector_and_fit(
        &self,
        id: &str,
        vector: &[f32],
        fit_score: f32,
    ) -> sqlx::Result<()> {
        let mut map = self.rows.lock().unwrap();
        let row = map
            .get_mut(id)
            .ok_or_else(|| sqlx::Error::RowNotFound)?;
        row.vector = Some(pgvector::Vector::from(vector.to_vec()));
        row.fit_score = Some(fit_score);
        self.notifications
            .lock()
            .unwrap()
            .push(("job_scored".to_string(), id.to_string()));
        Ok(())
    }

    async fn ping(&self) -> sqlx::Result<()> {
        Ok(())
    }
}
