//! We Work Remotely adapter: RSS feed.
//!
//! Feed items title postings as "Company: Job Title"; region and type arrive
//! as custom elements on each item.

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use serde::Deserialize;

use crate::common::utils::preprocess_text;
use crate::domains::jobs::models::JobRow;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default, rename = "item")]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    guid: Guid,
    #[serde(default, rename = "pubDate")]
    pub_date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    region: String,
    #[serde(default, rename = "type")]
    job_type: String,
}

/// `<guid isPermaLink="false">...</guid>` carries an attribute, so the text
/// content needs its own field.
#[derive(Debug, Default, Deserialize)]
struct Guid {
    #[serde(default, rename = "$text")]
    value: String,
}

pub async fn fetch(client: &reqwest::Client, feed_url: &str) -> Result<Vec<JobRow>> {
    let response = client
        .get(feed_url)
        .send()
        .await
        .context("weworkremotely request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("weworkremotely: status {}", status);
    }

    let body = response
        .text()
        .await
        .context("failed to read weworkremotely feed")?;

    let feed: Rss = quick_xml::de::from_str(&body)
        .context("failed to parse weworkremotely feed")?;

    Ok(feed
        .channel
        .items
        .into_iter()
        .filter_map(map_item)
        .collect())
}

fn map_item(item: Item) -> Option<JobRow> {
    if item.guid.value.is_empty() {
        return None;
    }

    // "Company: Job Title" → company + title
    let (company, title) = match item.title.split_once(':') {
        Some((company, title)) => (company.trim().to_string(), title.trim().to_string()),
        None => (String::new(), item.title.clone()),
    };

    let (description, _) = preprocess_text(&item.description, 0);

    let published_at = if item.pub_date.is_empty() {
        String::new()
    } else {
        match DateTime::parse_from_rfc2822(&item.pub_date) {
            Ok(parsed) => parsed.to_rfc3339(),
            Err(_) => item.pub_date.clone(),
        }
    };

    Some(JobRow {
        id: format!("wwr-{}", item.guid.value),
        source: "weworkremotely".to_string(),
        title,
        company,
        description,
        location: item.region,
        work_type: item.job_type,
        url: item.link,
        published_at,
        // WWR does not publish salary data in the feed
        salary_min: 0,
        salary_max: 0,
        ..JobRow::default()
    })
}
