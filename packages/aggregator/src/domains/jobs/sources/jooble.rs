//! Jooble adapter: keyword/location search API, credentialed, paginated via
//! POST body parameters.

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::common::utils::preprocess_text;
use crate::domains::jobs::models::JobRow;
use crate::domains::jobs::sources::{id_to_string, PAGE_SIZE};
use crate::domains::jobs::sources::salary::parse_salary_range;

#[derive(Debug, Serialize)]
struct JoobleRequest<'a> {
    keywords: &'a str,
    location: &'a str,
    page: u32,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct JoobleResponse {
    #[serde(default)]
    jobs: Vec<JoobleJob>,
}

#[derive(Debug, Deserialize)]
struct JoobleJob {
    /// Delivered as a number or a string depending on the listing
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    title: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    location: String,
    /// HTML snippet of the description
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    updated: String,
    #[serde(default)]
    salary: String,
}

/// Fetch one page (1-based) for a keyword/location pair.
pub async fn fetch_page(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    keywords: &str,
    location: &str,
    page: u32,
    limit: usize,
) -> Result<Vec<JobRow>> {
    if api_key.is_empty() {
        bail!("jooble API key is required");
    }

    // First page of a small request only needs `limit` results
    let mut results_per_page = PAGE_SIZE;
    if limit > 0 && page == 1 && limit < PAGE_SIZE {
        results_per_page = limit;
    }

    let response = client
        .post(format!("{}/{}", base_url.trim_end_matches('/'), api_key))
        .json(&JoobleRequest {
            keywords,
            location,
            page,
            limit: results_per_page,
        })
        .send()
        .await
        .context("jooble request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("jooble: status {}", status);
    }

    let data: JoobleResponse = response
        .json()
        .await
        .context("failed to decode jooble response")?;

    Ok(data.jobs.into_iter().filter_map(map_job).collect())
}

fn map_job(job: JoobleJob) -> Option<JobRow> {
    let upstream_id = id_to_string(&job.id);
    if upstream_id.is_empty() {
        // Listings without an id cannot be deduplicated; drop them
        return None;
    }

    let (salary_min, salary_max) = parse_salary_range(&job.salary);
    let (description, _) = preprocess_text(&job.snippet, 0);

    let published_at = if job.updated.is_empty() {
        String::new()
    } else {
        match DateTime::parse_from_rfc3339(&job.updated) {
            Ok(parsed) => parsed.to_rfc3339(),
            Err(_) => job.updated.clone(),
        }
    };

    Some(JobRow {
        id: format!("jooble-{}", upstream_id),
        source: "jooble".to_string(),
        title: job.title,
        company: job.company,
        description,
        location: job.location,
        salary_min,
        salary_max,
        url: job.link,
        published_at,
        ..JobRow::default()
    })
}
