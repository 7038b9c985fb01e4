use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub embedder_url: String,
    pub skills_file: String,

    // Scheduling
    pub fetch_interval: Duration,
    pub score_interval: Duration,
    pub fetch_timeout: Duration,
    pub run_initial_fetch: bool,

    // Job sources
    pub adzuna_app_id: Option<String>,
    pub adzuna_app_key: Option<String>,
    pub jooble_api_key: Option<String>,
    pub remotive_base_url: String,
    pub adzuna_base_url: String,
    pub jooble_base_url: String,
    pub remoteok_base_url: String,
    pub wwr_feed_url: String,

    // Fetcher tuning
    pub fetcher_max_pages: u32,
    pub jooble_concurrency: usize,
    pub jooble_timeout: Duration,

    // Scoring
    pub embedder_worker_count: usize,
    pub embedder_max_retries: u32,
    pub embedder_base_delay: Duration,
    pub embedder_max_delay: Duration,

    // Manual trigger auth (empty disables that auth path)
    pub manual_fetch_token: Option<String>,
    pub cron_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            embedder_url: env::var("EMBEDDER_URL").context("EMBEDDER_URL must be set")?,
            skills_file: env::var("SKILLS_FILE").context("SKILLS_FILE must be set")?,

            fetch_interval: duration_secs("FETCH_INTERVAL_SECS", 7200)?,
            score_interval: duration_secs("SCORE_INTERVAL_SECS", 14400)?,
            fetch_timeout: duration_secs("FETCH_TIMEOUT_SECS", 30)?,
            run_initial_fetch: bool_with_default("RUN_INITIAL_FETCH", true)?,

            adzuna_app_id: non_empty(env::var("ADZUNA_APP_ID").ok()),
            adzuna_app_key: non_empty(env::var("ADZUNA_APP_KEY").ok()),
            jooble_api_key: non_empty(env::var("JOOBLE_API_KEY").ok()),
            remotive_base_url: env::var("REMOTIVE_BASE_URL")
                .unwrap_or_else(|_| "https://remotive.com/api/remote-jobs".to_string()),
            adzuna_base_url: env::var("ADZUNA_BASE_URL")
                .unwrap_or_else(|_| "https://api.adzuna.com/v1/api/jobs/us/search".to_string()),
            jooble_base_url: env::var("JOOBLE_BASE_URL")
                .unwrap_or_else(|_| "https://jooble.org/api".to_string()),
            remoteok_base_url: env::var("REMOTEOK_BASE_URL")
                .unwrap_or_else(|_| "https://remoteok.com".to_string()),
            wwr_feed_url: env::var("WWR_FEED_URL")
                .unwrap_or_else(|_| "https://weworkremotely.com/remote-jobs.rss".to_string()),

            fetcher_max_pages: parse_with_default("FETCHER_MAX_PAGES", 5)?,
            jooble_concurrency: parse_with_default("JOOBLE_CONCURRENCY", 3)?,
            jooble_timeout: duration_secs("JOOBLE_TIMEOUT_SECS", 120)?,

            embedder_worker_count: parse_with_default("EMBEDDER_WORKER_COUNT", 4)?,
            embedder_max_retries: parse_with_default("EMBEDDER_MAX_RETRIES", 10)?,
            embedder_base_delay: duration_millis("EMBEDDER_BASE_DELAY_MS", 1000)?,
            embedder_max_delay: duration_millis("EMBEDDER_MAX_DELAY_MS", 30000)?,

            manual_fetch_token: non_empty(env::var("MANUAL_FETCH_TOKEN").ok()),
            cron_secret: non_empty(env::var("CRON_SECRET").ok()),
        })
    }

    /// Adzuna requires app credentials; without them the source is skipped.
    pub fn is_adzuna_enabled(&self) -> bool {
        self.adzuna_app_id.is_some() && self.adzuna_app_key.is_some()
    }

    /// Jooble requires an API key; without it the source is skipped.
    pub fn is_jooble_enabled(&self) -> bool {
        self.jooble_api_key.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_with_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

fn duration_secs(key: &str, default_secs: u64) -> Result<Duration> {
    Ok(Duration::from_secs(parse_with_default(key, default_secs)?))
}

fn duration_millis(key: &str, default_millis: u64) -> Result<Duration> {
    Ok(Duration::from_millis(parse_with_default(
        key,
        default_millis,
    )?))
}

fn bool_with_default(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) => Ok(matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        Err(_) => Ok(default),
    }
}
