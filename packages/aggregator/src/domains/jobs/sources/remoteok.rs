//! RemoteOK adapter: single JSON endpoint.
//!
//! The API returns an array whose first element is a legal notice, not a
//! posting; every field is defaulted so it decodes, and rows without an id
//! are dropped.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::common::utils::preprocess_text;
use crate::domains::jobs::models::JobRow;
use crate::domains::jobs::sources::id_to_string;

#[derive(Debug, Deserialize)]
struct RemoteOkJob {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    date: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    salary_min: i32,
    #[serde(default)]
    salary_max: i32,
    #[serde(default)]
    url: String,
}

pub async fn fetch(client: &reqwest::Client, base_url: &str) -> Result<Vec<JobRow>> {
    let response = client
        .get(format!("{}/api", base_url.trim_end_matches('/')))
        .send()
        .await
        .context("remoteok request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("remoteok: status {}", status);
    }

    let data: Vec<RemoteOkJob> = response
        .json()
        .await
        .context("failed to decode remoteok response")?;

    Ok(data.into_iter().filter_map(map_job).collect())
}

fn map_job(job: RemoteOkJob) -> Option<JobRow> {
    let upstream_id = id_to_string(&job.id);
    if upstream_id.is_empty() {
        return None;
    }

    let (description, _) = preprocess_text(&job.description, 0);

    Some(JobRow {
        id: format!("remoteok-{}", upstream_id),
        source: "remoteok".to_string(),
        title: job.position,
        company: job.company,
        description,
        location: job.location,
        // First tag stands in for a work type
        work_type: job.tags.into_iter().next().unwrap_or_default(),
        salary_min: job.salary_min,
        salary_max: job.salary_max,
        url: job.url,
        published_at: job.date,
        ..JobRow::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_notice_element_is_skipped() {
        let data: Vec<RemoteOkJob> = serde_json::from_str(
            r#"[
                {"legal": "API terms of service..."},
                {
                    "id": "99001",
                    "date": "2025-08-03T00:00:00+00:00",
                    "company": "Umbrella",
                    "position": "Site Reliability Engineer",
                    "tags": ["devops", "golang"],
                    "description": "<p>Keep it up</p>",
                    "location": "Worldwide",
                    "salary_min": 70000,
                    "salary_max": 110000,
                    "url": "https://remoteok.com/jobs/99001"
                }
            ]"#,
        )
        .expect("payload should decode");

        let rows: Vec<JobRow> = data.into_iter().filter_map(map_job).collect();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.id, "remoteok-99001");
        assert_eq!(row.title, "Site Reliability Engineer");
        assert_eq!(row.work_type, "devops");
        assert_eq!(row.description, "Keep it up");
    }

    #[test]
    fn test_numeric_id_decodes() {
        let data: Vec<RemoteOkJob> =
            serde_json::from_str(r#"[{"id": 7, "position": "Dev", "url": "u"}]"#)
                .expect("payload should decode");
        let rows: Vec<JobRow> = data.into_iter().filter_map(map_job).collect();
        assert_eq!(rows[0].id, "remoteok-7");
    }
}
