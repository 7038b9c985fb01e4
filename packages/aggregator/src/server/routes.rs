//! HTTP handlers: health probes and the manual fetch/score triggers.
//!
//! Trigger endpoints acknowledge immediately; the actual pipeline work runs
//! detached in the background and its failures are observable via logs and
//! store state, not via the triggering response.

use axum::extract::{Extension, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::server::app::AppState;

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

pub async fn healthz_handler() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

pub async fn health_db_handler(Extension(state): Extension<AppState>) -> impl IntoResponse {
    info!("DB health check requested");

    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"ok": true}))),
        Err(err) => {
            error!(error = %err, "DB health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"ok": false, "error": err.to_string()})),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    token: Option<String>,
    sources: Option<String>,
    job_count: Option<String>,
}

/// Either `?token=` or the `X-Cron-Secret` header authorizes a trigger; an
/// unset secret disables that path.
fn is_authorized(config: &Config, params: &TriggerParams, headers: &HeaderMap) -> bool {
    let token_ok = matches!(
        (&params.token, &config.manual_fetch_token),
        (Some(token), Some(expected)) if token == expected
    );

    let cron_secret = headers
        .get("x-cron-secret")
        .and_then(|value| value.to_str().ok());
    let cron_ok = matches!(
        (cron_secret, &config.cron_secret),
        (Some(secret), Some(expected)) if secret == expected
    );

    token_ok || cron_ok
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "ok": false,
            "error": "Missing or invalid token or X-Cron-Secret header",
            "message": "Authorization required"
        })),
    )
}

fn parse_sources(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_job_count(raw: Option<&str>) -> usize {
    match raw {
        None | Some("") => 0,
        Some(raw) => match raw.parse::<usize>() {
            Ok(count) if count > 0 => count,
            _ => {
                warn!(job_count = raw, "Invalid job_count parameter, using default");
                0
            }
        },
    }
}

pub async fn trigger_fetch_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<TriggerParams>,
) -> impl IntoResponse {
    info!("Manual fetch triggered");

    if !is_authorized(&state.config, &params, &headers) {
        warn!("Missing or invalid token or X-Cron-Secret header");
        return unauthorized();
    }

    let sources = parse_sources(params.sources.as_deref());
    let job_count = parse_job_count(params.job_count.as_deref());

    info!(?sources, job_count, "Manual fetch with sources");

    // Run the fetch in the background so the HTTP response is immediate; the
    // fresh token keeps it detached from the request lifetime
    let handle = state.job_service.clone();
    let task_sources = sources.clone();
    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        let service = handle.get().await;
        if let Err(err) = service
            .fetch_and_process_jobs_from_sources(&task_sources, job_count, &cancel)
            .await
        {
            error!(error = %err, "Manual fetch failed");
        }
    });

    let mut message = String::from("fetch triggered");
    if !sources.is_empty() {
        message = format!("fetch triggered for sources: {}", sources.join(", "));
    }
    if job_count > 0 {
        message = format!("{message} (max {job_count} jobs per source)");
    }

    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "message": message,
            "sources": sources,
            "job_count": job_count
        })),
    )
}

pub async fn trigger_score_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<TriggerParams>,
) -> impl IntoResponse {
    info!("Manual scoring triggered");

    if !is_authorized(&state.config, &params, &headers) {
        warn!("Missing or invalid token or X-Cron-Secret header");
        return unauthorized();
    }

    let handle = state.job_service.clone();
    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        let service = handle.get().await;
        if let Err(err) = service.score_new_jobs(&cancel).await {
            error!(error = %err, "Manual scoring failed");
        }
    });

    (
        StatusCode::OK,
        Json(json!({"ok": true, "message": "scoring triggered"})),
    )
}
