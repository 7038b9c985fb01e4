//! Job row model and the PostgreSQL store.
//!
//! The store owns the three operations the pipeline needs: an idempotent
//! batched upsert, the unscored-rows read, and the per-row vector/fit update.
//! Inserts and score updates emit `pg_notify` events for downstream
//! consumers.

use pgvector::Vector;
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::common::utils::preprocess_text;
use crate::kernel::traits::BaseJobStore;

/// A normalized job posting.
///
/// `id` is stable and deterministic for the same upstream posting (prefixed
/// source-native id, or a content hash of the URL) so repeated fetches are
/// idempotent. `vector` and `fit_score` are set together by the scorer, never
/// independently.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub source: String,
    pub title: String,
    pub company: String,
    pub description: String,
    pub location: String,
    pub work_type: String,
    pub salary_min: i32,
    pub salary_max: i32,
    pub url: String,
    /// ISO-8601, as delivered by the source (best-effort normalized).
    pub published_at: String,
    #[sqlx(default)]
    pub vector: Option<Vector>,
    #[sqlx(default)]
    pub fit_score: Option<f32>,
}

/// Rows are inserted in batches of this size to keep transactions small.
const UPSERT_BATCH_SIZE: usize = 100;

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl BaseJobStore for JobStore {
    /// Idempotent batched upsert: conflicts on `id` are silently ignored, and
    /// a `new_job` notification is emitted for each row actually inserted.
    ///
    /// Returns the number of newly inserted rows.
    async fn upsert_jobs(&self, rows: &[JobRow]) -> sqlx::Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let stmt = r#"
            INSERT INTO jobs
            (id, source, title, company, description, location, work_type,
             salary_min, salary_max, url, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
        "#;

        let mut inserted: Vec<&str> = Vec::new();

        for (batch_index, batch) in rows.chunks(UPSERT_BATCH_SIZE).enumerate() {
            debug!(
                batch = batch_index + 1,
                batch_rows = batch.len(),
                total_rows = rows.len(),
                "Processing job batch"
            );

            for row in batch {
                // Sanitize description: convert HTML to text if needed
                let (description, _) = preprocess_text(&row.description, 0);

                let result = sqlx::query(stmt)
                    .bind(&row.id)
                    .bind(&row.source)
                    .bind(&row.title)
                    .bind(&row.company)
                    .bind(&description)
                    .bind(&row.location)
                    .bind(&row.work_type)
                    .bind(row.salary_min)
                    .bind(row.salary_max)
                    .bind(&row.url)
                    .bind(&row.published_at)
                    .execute(&mut *tx)
                    .await?;

                // Only actual inserts (not conflicts) notify listeners
                if result.rows_affected() > 0 {
                    inserted.push(&row.id);
                }
            }
        }

        for job_id in &inserted {
            if let Err(err) = sqlx::query("SELECT pg_notify('new_job', $1)")
                .bind(job_id)
                .execute(&mut *tx)
                .await
            {
                error!(job_id, error = %err, "NOTIFY new_job failed");
            }
        }

        tx.commit().await?;

        info!(
            total_processed = rows.len(),
            new_jobs = inserted.len(),
            "Successfully processed all job batches"
        );

        Ok(inserted.len())
    }

    async fn fetch_rows_needing_vector(&self) -> sqlx::Result<Vec<JobRow>> {
        sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, source, title, company, description, location, work_type,
                   salary_min, salary_max, url, published_at
            FROM jobs
            WHERE vector IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Persist a posting's vector and fit score together, then notify.
    async fn update_vector_and_fit(
        &self,
        id: &str,
        vector: &[f32],
        fit_score: f32,
    ) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE jobs SET vector = $1, fit_score = $2 WHERE id = $3")
            .bind(Vector::from(vector.to_vec()))
            .bind(fit_score)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Err(err) = sqlx::query("SELECT pg_notify('job_scored', $1)")
            .bind(id)
            .execute(&mut *tx)
            .await
        {
            error!(job_id = id, error = %err, "NOTIFY job_scored failed");
        }

        tx.commit().await
    }

    async fn ping(&self) -> sqlx::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}
