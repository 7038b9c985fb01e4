//! Adzuna adapter: paginated JSON search API, credentialed.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::common::utils::preprocess_text;
use crate::domains::jobs::models::JobRow;
use crate::domains::jobs::sources::PAGE_SIZE;

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: AdzunaCompany,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: AdzunaLocation,
    #[serde(default)]
    category: AdzunaCategory,
    #[serde(default)]
    salary_min: f64,
    #[serde(default)]
    salary_max: f64,
    #[serde(default)]
    redirect_url: String,
    /// RFC3339
    #[serde(default)]
    created: String,
}

#[derive(Debug, Default, Deserialize)]
struct AdzunaCompany {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AdzunaLocation {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AdzunaCategory {
    #[serde(default)]
    label: String,
}

/// Fetch one results page (1-based).
pub async fn fetch_page(
    client: &reqwest::Client,
    base_url: &str,
    page: u32,
    app_id: &str,
    app_key: &str,
) -> Result<Vec<JobRow>> {
    if app_id.is_empty() || app_key.is_empty() {
        bail!("adzuna API credentials are required");
    }

    let url = format!("{}/{}", base_url.trim_end_matches('/'), page);
    let per_page = PAGE_SIZE.to_string();
    let response = client
        .get(&url)
        .query(&[
            ("app_id", app_id),
            ("app_key", app_key),
            ("results_per_page", per_page.as_str()),
            ("sort_by", "date"),
        ])
        .send()
        .await
        .context("adzuna request failed")?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("adzuna: status {}, body: {}", status, body);
    }
    // Some error pages come back as HTML with a 200
    if !content_type.is_empty() && !content_type.contains("json") {
        let body = response.text().await.unwrap_or_default();
        bail!("adzuna: unexpected content-type {}, body: {}", content_type, body);
    }

    let data: AdzunaResponse = response
        .json()
        .await
        .context("failed to decode adzuna response")?;

    Ok(data.results.into_iter().map(map_job).collect())
}

fn map_job(job: AdzunaJob) -> JobRow {
    let (description, _) = preprocess_text(&job.description, 0);
    JobRow {
        // Source-prefixed id prevents cross-source collisions
        id: format!("adzuna-{}", job.id),
        source: "adzuna".to_string(),
        title: job.title,
        company: job.company.display_name,
        description,
        location: job.location.display_name,
        work_type: strip_jobs_suffix(&job.category.label),
        salary_min: job.salary_min as i32,
        salary_max: job.salary_max as i32,
        url: job.redirect_url,
        published_at: job.created,
        ..JobRow::default()
    }
}

/// Category labels read like "IT Jobs"; drop the trailing "Job(s)".
fn strip_jobs_suffix(label: &str) -> String {
    let mut work_type = label.trim();
    for suffix in [" Jobs", " jobs", " Job", " job"] {
        work_type = work_type.strip_suffix(suffix).unwrap_or(work_type);
    }
    work_type.to_string()
}
