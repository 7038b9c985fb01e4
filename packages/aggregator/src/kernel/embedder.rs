//! HTTP client for the companion embedding microservice.
//!
//! The service exposes `POST /embed` taking `{"text": ...}` and returning
//! `{"vector": [...]}`, plus `GET /health` used for an advisory warmup probe.
//!
//! # Retry policy
//!
//! Transport failures (no status obtained), HTTP 429 and HTTP 5xx are retried
//! with exponential backoff (`base * 2^attempt`, capped). Any other 4xx fails
//! immediately. Each attempt carries its own bounded timeout; the caller's
//! cancellation token is checked before every attempt and raced against the
//! backoff sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::common::utils::{preprocess_text, MAX_EMBED_TEXT_LENGTH};
use crate::config::Config;
use crate::kernel::traits::BaseEmbeddingService;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// Text was empty after HTML stripping and trimming; never retried.
    #[error("empty text provided for embedding")]
    EmptyInput,

    /// The service answered 200 with a zero-length vector; never retried.
    #[error("embedding service returned an empty vector")]
    EmptyVector,

    /// A 4xx other than 429; the request itself is at fault, never retried.
    #[error("embedding service rejected the request with status {0}")]
    UpstreamRejected(StatusCode),

    /// 429 or 5xx; retried with backoff.
    #[error("embedding service returned status {0}")]
    UpstreamStatus(StatusCode),

    /// Connection/timeout failure before any status was obtained; retried.
    #[error("failed to call embedding service: {0}")]
    Transport(#[from] reqwest::Error),

    /// 200 response whose body did not decode; never retried.
    #[error("failed to decode embedding response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("embedding service failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<EmbedError>,
    },

    #[error("embedding operation cancelled")]
    Cancelled,
}

impl EmbedError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbedError::Transport(_) => true,
            EmbedError::UpstreamStatus(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Retry/timeout knobs, injectable so tests run with millisecond delays.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vector: Vec<f32>,
}

/// Client for the embedding microservice.
pub struct Embedder {
    client: reqwest::Client,
    base_url: String,
    config: EmbedderConfig,
    warmed_up: AtomicBool,
}

impl Embedder {
    pub fn new(cfg: &Config) -> Result<Self> {
        let config = EmbedderConfig {
            max_retries: cfg.embedder_max_retries,
            base_delay: cfg.embedder_base_delay,
            max_delay: cfg.embedder_max_delay,
            ..EmbedderConfig::default()
        };
        Self::with_config(&cfg.embedder_url, config)
    }

    pub fn with_config(base_url: &str, config: EmbedderConfig) -> Result<Self> {
        // Generous client-wide timeout for background batches; individual
        // attempts are bounded separately by `attempt_timeout`.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client for embedder")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            warmed_up: AtomicBool::new(false),
        })
    }

    /// One-time advisory health probe against the companion service.
    ///
    /// Failure is logged and does not block subsequent embed calls.
    pub async fn warmup(&self) {
        if self.warmed_up.swap(true, Ordering::SeqCst) {
            return;
        }

        let health_url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&health_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(url = %health_url, "Embedder service warmup check succeeded");
            }
            Ok(response) => {
                warn!(
                    url = %health_url,
                    status = %response.status(),
                    "Embedder service warmup check returned non-success status"
                );
            }
            Err(err) => {
                warn!(
                    url = %health_url,
                    error = %err,
                    "Embedder service warmup check failed"
                );
            }
        }
    }

    /// Embed text, preprocessing it first and retrying transient failures.
    pub async fn embed(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbedError> {
        let (processed, was_html) = preprocess_text(text, MAX_EMBED_TEXT_LENGTH);
        if processed.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        self.warmup().await;

        // sha256 + preview let the request be correlated with the embedder
        // service's own logs.
        let text_hash = hex::encode(Sha256::digest(processed.as_bytes()));
        let preview: String = processed
            .chars()
            .take(100)
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();

        info!(
            original_length = text.len(),
            processed_length = processed.len(),
            was_html,
            sha256 = %text_hash,
            preview = %preview,
            "Starting embedding request"
        );

        let request = EmbedRequest { text: processed };
        self.perform_embedding(&request, &text_hash, cancel).await
    }

    async fn perform_embedding(
        &self,
        request: &EmbedRequest,
        text_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbedError> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(EmbedError::Cancelled);
            }

            match self.attempt_request(request).await {
                Ok(vector) => {
                    info!(
                        vector_dimensions = vector.len(),
                        sha256 = %text_hash,
                        attempt = attempt + 1,
                        "Received embedding response"
                    );
                    return Ok(vector);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries {
                        return Err(EmbedError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }

                    let exp = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                    let delay = self
                        .config
                        .base_delay
                        .saturating_mul(exp)
                        .min(self.config.max_delay);
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying embedder call"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(EmbedError::Cancelled),
                    }
                }
            }
        }
    }

    async fn attempt_request(&self, request: &EmbedRequest) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .timeout(self.config.attempt_timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(EmbedError::UpstreamStatus(status));
            }
            return Err(EmbedError::UpstreamRejected(status));
        }

        let body: EmbedResponse = response.json().await.map_err(EmbedError::Decode)?;
        if body.vector.is_empty() {
            return Err(EmbedError::EmptyVector);
        }

        Ok(body.vector)
    }
}

#[async_trait]
impl BaseEmbeddingService for Embedder {
    async fn embed(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, EmbedError> {
        Embedder::embed(self, text, cancel).await
    }
}
