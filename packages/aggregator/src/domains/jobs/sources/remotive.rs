//! Remotive adapter: single JSON endpoint, no pagination.
//!
//! Remotive does not deliver a stable numeric id, so the posting id is the
//! sha256 of the job URL.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::common::utils::preprocess_text;
use crate::domains::jobs::models::JobRow;
use crate::domains::jobs::sources::salary::parse_salary_range;

#[derive(Debug, Deserialize)]
struct RemotiveResponse {
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Deserialize)]
struct RemotiveJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    /// e.g. "80k-100k USD"
    #[serde(default)]
    salary: String,
    #[serde(default)]
    url: String,
    /// e.g. "2025-08-06T08:00:30"
    #[serde(default)]
    publication_date: String,
}

pub async fn fetch(client: &reqwest::Client, base_url: &str, limit: usize) -> Result<Vec<JobRow>> {
    let mut request = client.get(base_url);
    if limit > 0 {
        request = request.query(&[("limit", limit.to_string())]);
    }

    let response = request
        .send()
        .await
        .context("remotive request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("remotive: status {}", status);
    }

    let data: RemotiveResponse = response
        .json()
        .await
        .context("failed to decode remotive response")?;

    Ok(map_jobs(data, limit))
}

fn map_jobs(data: RemotiveResponse, limit: usize) -> Vec<JobRow> {
    let mut rows: Vec<JobRow> = data
        .jobs
        .into_iter()
        .map(|job| {
            let id = hex::encode(Sha256::digest(job.url.as_bytes()));
            let (salary_min, salary_max) = parse_salary_range(&job.salary);
            let (description, _) = preprocess_text(&job.description, 0);
            JobRow {
                id,
                source: "remotive".to_string(),
                title: job.title,
                company: job.company_name,
                description,
                location: job.category,
                salary_min,
                salary_max,
                url: job.url,
                published_at: job.publication_date,
                ..JobRow::default()
            }
        })
        .collect();

    if limit > 0 && rows.len() > limit {
        rows.truncate(limit);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RemotiveResponse {
        serde_json::from_str(
            r#"{
                "jobs": [
                    {
                        "title": "Rust Engineer",
                        "company_name": "Acme",
                        "description": "<p>Build <strong>services</strong></p>",
                        "category": "Software Development",
                        "salary": "80k-100k USD",
                        "url": "https://remotive.com/jobs/1",
                        "publication_date": "2025-08-06T08:00:30"
                    },
                    {
                        "title": "Go Engineer",
                        "company_name": "Globex",
                        "description": "Plain text",
                        "category": "Software Development",
                        "salary": "",
                        "url": "https://remotive.com/jobs/2",
                        "publication_date": "2025-08-05T10:00:00"
                    }
                ]
            }"#,
        )
        .expect("sample should decode")
    }

    #[test]
    fn test_map_jobs() {
        let rows = map_jobs(sample(), 0);
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.source, "remotive");
        assert_eq!(first.title, "Rust Engineer");
        assert_eq!(first.company, "Acme");
        assert_eq!(first.description, "Build services");
        assert_eq!((first.salary_min, first.salary_max), (80_000, 100_000));
        // sha256 of the URL, hex-encoded
        assert_eq!(first.id.len(), 64);
        assert!(first.vector.is_none());
    }

    #[test]
    fn test_map_jobs_id_is_deterministic() {
        let a = map_jobs(sample(), 0);
        let b = map_jobs(sample(), 0);
        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].id, a[1].id);
    }

    #[test]
    fn test_map_jobs_respects_limit() {
        let rows = map_jobs(sample(), 1);
        assert_eq!(rows.len(), 1);
    }
}
