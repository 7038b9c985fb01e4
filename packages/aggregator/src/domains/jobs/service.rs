//! Fetch orchestration: best-effort fan-out over the enabled sources,
//! adaptive pagination, dedup/merge, persistence and chained scoring.
//!
//! Per-source failures are isolated; a run fails only when every attempted
//! source errored or the store is unreachable. An empty merged set is a
//! logged no-op.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domains::jobs::error::JobError;
use crate::domains::jobs::models::JobRow;
use crate::domains::jobs::readiness::JobService;
use crate::domains::jobs::scorer;
use crate::domains::jobs::sources::{adzuna, jooble, remoteok, remotive, wwr, PAGE_SIZE};
use crate::kernel::{BaseEmbeddingService, BaseJobStore};

/// Upper bound on sources fetched at once.
const MAX_CONCURRENT_SOURCES: usize = 4;

/// Per-page timeout for the paginated boards.
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Detached deadline for the post-fetch store write.
const DB_TIMEOUT: Duration = Duration::from_secs(120);

/// One keyword/location pair with a search priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchQuery {
    pub keyword: &'static str,
    pub location: &'static str,
    pub weight: u32,
}

/// Weighted jooble search queries, highest priority first.
pub(crate) fn optimized_search_queries() -> Vec<SearchQuery> {
    let mut queries = vec![
        SearchQuery { keyword: "*", location: "remote", weight: 10 },
        SearchQuery { keyword: "engineer", location: "remote", weight: 9 },
        SearchQuery { keyword: "developer", location: "remote", weight: 9 },
        SearchQuery { keyword: "software", location: "remote", weight: 8 },
        SearchQuery { keyword: "*", location: "india", weight: 7 },
        SearchQuery { keyword: "engineer", location: "india", weight: 6 },
        SearchQuery { keyword: "developer", location: "india", weight: 6 },
        SearchQuery { keyword: "*", location: "united states", weight: 5 },
        SearchQuery { keyword: "*", location: "europe", weight: 4 },
    ];
    queries.sort_by(|a, b| b.weight.cmp(&a.weight));
    queries
}

/// Truncate the query set and lower concurrency for small requests; the full
/// set runs when no limit is given.
pub(crate) fn adaptive_search_strategy(
    full_concurrency: usize,
    job_count: usize,
) -> (usize, Vec<SearchQuery>) {
    let base = optimized_search_queries();

    if job_count > 0 {
        if job_count <= 50 {
            return (1, base[..3].to_vec());
        }
        if job_count <= 200 {
            return (2, base[..6].to_vec());
        }
    }

    (full_concurrency, base)
}

/// Whether a fetch error is worth a backoff-and-continue.
pub(crate) fn is_retryable_fetch_error(err: &anyhow::Error) -> bool {
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        if e.is_timeout() || e.is_connect() {
            return true;
        }
        if let Some(status) = e.status() {
            return status.as_u16() == 429 || status.is_server_error();
        }
        // Request died before a status was obtained
        return true;
    }

    let message = err.to_string().to_lowercase();
    [
        "timeout",
        "timed out",
        "rate limit",
        "429",
        "503",
        "502",
        "500",
        "connection refused",
        "network is unreachable",
    ]
    .iter()
    .any(|pattern| message.contains(pattern))
}

/// The live pipeline published once initialization completes.
pub struct JobServiceImpl {
    store: Arc<dyn BaseJobStore>,
    embedder: Arc<dyn BaseEmbeddingService>,
    skill_vec: Arc<Vec<f32>>,
    timeout: Duration,
    config: Arc<Config>,
    client: reqwest::Client,
}

impl JobServiceImpl {
    pub fn new(
        store: Arc<dyn BaseJobStore>,
        embedder: Arc<dyn BaseEmbeddingService>,
        skill_vec: Vec<f32>,
        config: Arc<Config>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("remote-job-radar/0.1")
            .build()?;

        Ok(Self {
            store,
            embedder,
            skill_vec: Arc::new(skill_vec),
            timeout: config.fetch_timeout,
            config,
            client,
        })
    }

    /// Fetch from the requested sources (all enabled sources when empty),
    /// concurrently with per-source isolation, and merge with dedup by id.
    async fn fetch_from_sources(
        &self,
        sources: &[String],
        job_count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<JobRow>, JobError> {
        let requested: HashSet<String> = sources.iter().map(|s| s.to_lowercase()).collect();
        let fetch_all = requested.is_empty();
        let wants = |name: &str| fetch_all || requested.contains(name);

        let cfg = &self.config;
        let mut planned: Vec<(&'static str, BoxFuture<'_, anyhow::Result<Vec<JobRow>>>)> =
            Vec::new();

        if wants("remotive") {
            planned.push((
                "remotive",
                Box::pin(remotive::fetch(&self.client, &cfg.remotive_base_url, job_count)),
            ));
        }

        if wants("adzuna") {
            if cfg.is_adzuna_enabled() {
                planned.push(("adzuna", Box::pin(self.fetch_from_adzuna(job_count, cancel))));
            } else {
                info!("Adzuna API not configured, skipping");
            }
        }

        if wants("jooble") {
            if cfg.is_jooble_enabled() {
                planned.push(("jooble", Box::pin(self.fetch_from_jooble(job_count, cancel))));
            } else {
                info!("Jooble API not configured, skipping");
            }
        }

        if wants("remoteok") {
            planned.push((
                "remoteok",
                Box::pin(remoteok::fetch(&self.client, &cfg.remoteok_base_url)),
            ));
        }

        if wants("wwr") || wants("weworkremotely") {
            planned.push(("weworkremotely", Box::pin(wwr::fetch(&self.client, &cfg.wwr_feed_url))));
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_SOURCES));
        let results = futures::future::join_all(planned.into_iter().map(|(name, fut)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await;
                info!(source = name, job_count, "Fetching jobs");
                (name, fut.await)
            }
        }))
        .await;

        let mut merged: Vec<JobRow> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for (name, result) in results {
            match result {
                Ok(rows) => {
                    succeeded += 1;
                    info!(source = name, count = rows.len(), "Retrieved jobs");
                    for row in rows {
                        if seen.insert(row.id.clone()) {
                            merged.push(row);
                        }
                    }
                }
                Err(err) => {
                    failed += 1;
                    // One source failing does not abort the others
                    error!(source = name, error = %err, "Source fetch error");
                }
            }
        }

        if succeeded == 0 && failed > 0 {
            return Err(JobError::AllSourcesFailed);
        }

        Ok(merged)
    }

    /// Paginated Adzuna fetch; partial results survive later page failures.
    async fn fetch_from_adzuna(
        &self,
        job_count: usize,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<JobRow>> {
        let cfg = &self.config;
        let app_id = cfg.adzuna_app_id.clone().unwrap_or_default();
        let app_key = cfg.adzuna_app_key.clone().unwrap_or_default();

        let mut max_pages = cfg.fetcher_max_pages;
        if job_count > 0 {
            let pages_needed = (job_count.div_ceil(PAGE_SIZE)).max(1) as u32;
            max_pages = max_pages.min(pages_needed);
            info!(job_count, pages_needed, max_pages, "Calculated pages needed for job count");
        }

        let mut all: Vec<JobRow> = Vec::new();

        for page in 1..=max_pages {
            if cancel.is_cancelled() {
                warn!(
                    page,
                    jobs_fetched = all.len(),
                    "Adzuna fetch interrupted by cancellation"
                );
                break;
            }

            let result = match tokio::time::timeout(
                PAGE_TIMEOUT,
                adzuna::fetch_page(&self.client, &cfg.adzuna_base_url, page, &app_id, &app_key),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(anyhow!("adzuna: page {} timed out", page)),
            };

            match result {
                Err(err) => {
                    error!(page, error = %err, "Adzuna fetch error");
                    if all.is_empty() {
                        return Err(err);
                    }
                    info!(count = all.len(), "Continuing with partial Adzuna results");
                    break;
                }
                Ok(rows) => {
                    debug!(count = rows.len(), page, "Retrieved jobs from Adzuna");
                    let page_len = rows.len();
                    all.extend(rows);

                    // Short page means end of data
                    if page_len < PAGE_SIZE || (job_count > 0 && all.len() >= job_count) {
                        break;
                    }
                }
            }
        }

        if job_count > 0 && all.len() > job_count {
            all.truncate(job_count);
        }

        info!(count = all.len(), "Total jobs fetched from Adzuna");
        Ok(all)
    }

    /// Jooble fan-out over the adaptive query set with a shared progress
    /// counter for early termination.
    async fn fetch_from_jooble(
        &self,
        job_count: usize,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<JobRow>> {
        let cfg = &self.config;
        let api_key = cfg.jooble_api_key.clone().unwrap_or_default();

        let (concurrency, queries) = adaptive_search_strategy(cfg.jooble_concurrency, job_count);
        info!(
            concurrency,
            search_queries = queries.len(),
            job_count,
            max_pages = cfg.fetcher_max_pages,
            "Using adaptive search strategy"
        );

        let mut max_pages = cfg.fetcher_max_pages;
        if job_count > 0 {
            let total_pages_needed = (job_count.div_ceil(PAGE_SIZE)).max(1) as u32;
            let pages_per_query = (total_pages_needed / queries.len() as u32).max(1);
            max_pages = max_pages.min(pages_per_query);
            info!(
                job_count,
                total_pages_needed,
                search_queries = queries.len(),
                pages_per_query,
                max_pages,
                "Calculated pages distribution"
            );
        }

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let total_fetched = Arc::new(AtomicUsize::new(0));
        // Shared merge target: (rows, seen ids), guarded by one mutex
        let merged = Arc::new(Mutex::new((Vec::<JobRow>::new(), HashSet::<String>::new())));

        // The whole jooble fan-out runs under its own deadline
        let op_cancel = cancel.child_token();
        let watchdog = {
            let op_cancel = op_cancel.clone();
            let timeout = cfg.jooble_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                op_cancel.cancel();
            })
        };

        let mut handles = Vec::new();
        for query in queries {
            // Early termination before starting another query
            if job_count > 0 && total_fetched.load(Ordering::SeqCst) >= job_count {
                break;
            }

            handles.push(tokio::spawn(fetch_jooble_query(
                self.client.clone(),
                cfg.jooble_base_url.clone(),
                api_key.clone(),
                query,
                max_pages,
                job_count,
                Arc::clone(&merged),
                Arc::clone(&total_fetched),
                Arc::clone(&semaphore),
                op_cancel.clone(),
            )));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "Jooble query task failed");
            }
        }
        watchdog.abort();

        let (mut all, seen) = {
            let mut guard = merged.lock().unwrap();
            (std::mem::take(&mut guard.0), std::mem::take(&mut guard.1))
        };

        if job_count > 0 && all.len() > job_count {
            all.truncate(job_count);
        }

        info!(
            count = all.len(),
            unique_jobs = seen.len(),
            "Total jobs fetched from Jooble"
        );

        Ok(all)
    }
}

/// One keyword/location query: paginate, dedup locally, then merge into the
/// shared result set under the mutex.
#[allow(clippy::too_many_arguments)]
async fn fetch_jooble_query(
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    query: SearchQuery,
    max_pages: u32,
    job_count: usize,
    merged: Arc<Mutex<(Vec<JobRow>, HashSet<String>)>>,
    total_fetched: Arc<AtomicUsize>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) {
    let _permit = tokio::select! {
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
        },
        _ = cancel.cancelled() => return,
    };

    info!(
        keyword = query.keyword,
        location = query.location,
        "Fetching Jooble jobs"
    );

    let mut query_jobs: Vec<JobRow> = Vec::new();
    // Local dedup: the same listing can repeat across a query's pages
    let mut seen_local: HashSet<String> = HashSet::new();

    for page in 1..=max_pages {
        if cancel.is_cancelled() {
            break;
        }
        if job_count > 0 && total_fetched.load(Ordering::SeqCst) >= job_count {
            break;
        }

        let result = match tokio::time::timeout(
            PAGE_TIMEOUT,
            jooble::fetch_page(
                &client,
                &base_url,
                &api_key,
                query.keyword,
                query.location,
                page,
                job_count,
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow!("jooble: page {} timed out", page)),
        };

        match result {
            Err(err) => {
                error!(
                    keyword = query.keyword,
                    location = query.location,
                    page,
                    error = %err,
                    "Jooble fetch error"
                );

                if is_retryable_fetch_error(&err) && page < max_pages {
                    let backoff = Duration::from_secs(page as u64);
                    info!(backoff_ms = backoff.as_millis() as u64, "Retrying after backoff");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => continue,
                        _ = cancel.cancelled() => break,
                    }
                }
                break;
            }
            Ok(rows) => {
                debug!(
                    count = rows.len(),
                    keyword = query.keyword,
                    location = query.location,
                    page,
                    "Retrieved jobs from Jooble"
                );

                let page_len = rows.len();
                for row in rows {
                    if seen_local.insert(row.id.clone()) {
                        query_jobs.push(row);
                    }
                }

                if page_len < PAGE_SIZE {
                    break;
                }
                if job_count > 0 && total_fetched.load(Ordering::SeqCst) >= job_count {
                    break;
                }
            }
        }
    }

    if !query_jobs.is_empty() {
        let mut guard = merged.lock().unwrap();
        let (all, seen) = &mut *guard;
        for job in query_jobs {
            if job_count > 0 && total_fetched.load(Ordering::SeqCst) >= job_count {
                break;
            }
            if seen.insert(job.id.clone()) {
                all.push(job);
                total_fetched.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl JobService for JobServiceImpl {
    async fn fetch_and_process_jobs(&self, cancel: &CancellationToken) -> Result<(), JobError> {
        self.fetch_and_process_jobs_from_sources(&[], 0, cancel).await
    }

    async fn fetch_and_process_jobs_from_sources(
        &self,
        sources: &[String],
        job_count: usize,
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let start = Instant::now();
        if !sources.is_empty() {
            info!(?sources, "Starting job fetch operation from specific sources");
        } else {
            info!("Starting job fetch operation from all sources");
        }
        if job_count > 0 {
            info!(job_count, "Job count limit specified");
        } else {
            info!("No job count limit specified, fetching all available jobs");
        }

        // Operation deadline: cancel the fetch fan-out when it elapses
        let fetch_cancel = cancel.child_token();
        let watchdog = {
            let fetch_cancel = fetch_cancel.clone();
            let timeout = self.timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                fetch_cancel.cancel();
            })
        };

        let fetched = self.fetch_from_sources(sources, job_count, &fetch_cancel).await;
        watchdog.abort();
        let all_jobs = fetched?;

        if all_jobs.is_empty() {
            if !sources.is_empty() {
                warn!(?sources, "No jobs fetched from specified sources");
            } else {
                warn!("No jobs fetched from any source");
            }
            return Ok(());
        }

        info!(total_jobs = all_jobs.len(), "Upserting jobs to database");

        // Detached deadline: the caller's fetch timeout must not truncate the
        // store write
        match tokio::time::timeout(DB_TIMEOUT, self.store.upsert_jobs(&all_jobs)).await {
            Ok(result) => {
                result?;
            }
            Err(_) => return Err(JobError::StoreTimeout),
        }

        info!(
            count = all_jobs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Successfully upserted jobs"
        );

        // Score new jobs immediately, detached from the caller's deadline so
        // a large batch is not cut short
        info!("Scoring newly fetched jobs");
        let score_cancel = CancellationToken::new();
        self.score_new_jobs(&score_cancel).await
    }

    async fn score_new_jobs(&self, cancel: &CancellationToken) -> Result<(), JobError> {
        let start = Instant::now();
        info!("Starting job scoring operation");

        scorer::score_new_rows(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            Arc::clone(&self.skill_vec),
            self.config.embedder_worker_count,
            cancel,
        )
        .await?;

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Scoring completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MemoryJobStore, MockEmbeddingService};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_queries_sorted_by_weight() {
        let queries = optimized_search_queries();
        assert_eq!(queries.len(), 9);
        assert_eq!((queries[0].keyword, queries[0].location), ("*", "remote"));
        for pair in queries.windows(2) {
            assert!(pair[0].weight >= pair[1].weight);
        }
    }

    #[test]
    fn test_adaptive_strategy_small_limit() {
        let (concurrency, queries) = adaptive_search_strategy(3, 50);
        assert_eq!(concurrency, 1);
        assert_eq!(queries.len(), 3);
    }

    #[test]
    fn test_adaptive_strategy_medium_limit() {
        let (concurrency, queries) = adaptive_search_strategy(3, 200);
        assert_eq!(concurrency, 2);
        assert_eq!(queries.len(), 6);
    }

    #[test]
    fn test_adaptive_strategy_large_and_unlimited() {
        let (concurrency, queries) = adaptive_search_strategy(3, 201);
        assert_eq!(concurrency, 3);
        assert_eq!(queries.len(), 9);

        let (concurrency, queries) = adaptive_search_strategy(5, 0);
        assert_eq!(concurrency, 5);
        assert_eq!(queries.len(), 9);
    }

    #[test]
    fn test_retryable_error_classification() {
        assert!(is_retryable_fetch_error(&anyhow!("jooble: status 503")));
        assert!(is_retryable_fetch_error(&anyhow!("request timed out")));
        assert!(is_retryable_fetch_error(&anyhow!("rate limit exceeded")));
        assert!(!is_retryable_fetch_error(&anyhow!("jooble: status 401")));
        assert!(!is_retryable_fetch_error(&anyhow!(
            "failed to decode jooble response"
        )));
    }

    fn test_config(server_uri: &str) -> Config {
        Config {
            port: 0,
            database_url: String::new(),
            embedder_url: format!("{server_uri}/embedder"),
            skills_file: String::new(),
            fetch_interval: Duration::from_secs(3600),
            score_interval: Duration::from_secs(3600),
            fetch_timeout: Duration::from_secs(10),
            run_initial_fetch: false,
            adzuna_app_id: None,
            adzuna_app_key: None,
            jooble_api_key: None,
            remotive_base_url: format!("{server_uri}/remotive"),
            adzuna_base_url: format!("{server_uri}/adzuna"),
            jooble_base_url: format!("{server_uri}/jooble"),
            remoteok_base_url: format!("{server_uri}/remoteok"),
            wwr_feed_url: format!("{server_uri}/wwr.rss"),
            fetcher_max_pages: 2,
            jooble_concurrency: 2,
            jooble_timeout: Duration::from_secs(10),
            embedder_worker_count: 2,
            embedder_max_retries: 1,
            embedder_base_delay: Duration::from_millis(1),
            embedder_max_delay: Duration::from_millis(5),
            manual_fetch_token: None,
            cron_secret: None,
        }
    }

    fn remotive_body(count: usize) -> serde_json::Value {
        let jobs: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "title": format!("Engineer {i}"),
                    "company_name": "Acme",
                    "description": "Builds things",
                    "category": "Software Development",
                    "salary": "",
                    "url": format!("https://remotive.com/jobs/{i}"),
                    "publication_date": "2025-08-06T08:00:30"
                })
            })
            .collect();
        serde_json::json!({ "jobs": jobs })
    }

    async fn build_service(
        config: Config,
        store: Arc<MemoryJobStore>,
    ) -> JobServiceImpl {
        let embedder = Arc::new(MockEmbeddingService::new(vec![1.0, 0.0]));
        JobServiceImpl::new(store, embedder, vec![1.0, 0.0], Arc::new(config))
            .expect("service should build")
    }

    #[tokio::test]
    async fn test_partial_source_failure_still_persists_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/remotive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(remotive_body(10)))
            .mount(&server)
            .await;
        // Adzuna errors on every page
        Mock::given(method("GET"))
            .and(path("/adzuna/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.adzuna_app_id = Some("id".to_string());
        config.adzuna_app_key = Some("key".to_string());

        let store = Arc::new(MemoryJobStore::new());
        let service = build_service(config, store.clone()).await;

        let sources = vec!["remotive".to_string(), "adzuna".to_string()];
        service
            .fetch_and_process_jobs_from_sources(&sources, 0, &CancellationToken::new())
            .await
            .expect("partial failure is still a success");

        assert_eq!(store.row_count(), 10);
        // The chained scoring pass ran too
        assert_eq!(store.scored_count(), 10);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/adzuna/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.adzuna_app_id = Some("id".to_string());
        config.adzuna_app_key = Some("key".to_string());

        let store = Arc::new(MemoryJobStore::new());
        let service = build_service(config, store.clone()).await;

        let sources = vec!["adzuna".to_string()];
        let err = service
            .fetch_and_process_jobs_from_sources(&sources, 0, &CancellationToken::new())
            .await
            .expect_err("all sources failed");
        assert!(matches!(err, JobError::AllSourcesFailed));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_merged_results_are_deduplicated_by_id() {
        let server = MockServer::start().await;
        // Two postings sharing a URL hash to the same id
        let body = serde_json::json!({
            "jobs": [
                {
                    "title": "Engineer",
                    "company_name": "Acme",
                    "description": "d",
                    "category": "c",
                    "salary": "",
                    "url": "https://remotive.com/jobs/same",
                    "publication_date": ""
                },
                {
                    "title": "Engineer (repost)",
                    "company_name": "Acme",
                    "description": "d",
                    "category": "c",
                    "salary": "",
                    "url": "https://remotive.com/jobs/same",
                    "publication_date": ""
                }
            ]
        });
        Mock::given(method("GET"))
            .and(path("/remotive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryJobStore::new());
        let service = build_service(test_config(&server.uri()), store.clone()).await;

        let sources = vec!["remotive".to_string()];
        service
            .fetch_and_process_jobs_from_sources(&sources, 0, &CancellationToken::new())
            .await
            .expect("fetch should succeed");

        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_merge_is_a_noop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/remotive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(remotive_body(0)))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryJobStore::new());
        let service = build_service(test_config(&server.uri()), store.clone()).await;

        let sources = vec!["remotive".to_string()];
        service
            .fetch_and_process_jobs_from_sources(&sources, 0, &CancellationToken::new())
            .await
            .expect("empty fetch is not an error");

        assert_eq!(store.row_count(), 0);
        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_jooble_queries_merge_without_double_counting() {
        let server = MockServer::start().await;
        // Every query/page returns the same two listings; the shared seen-set
        // must collapse them to two rows. A short page (< 50) ends each query.
        let body = serde_json::json!({
            "jobs": [
                {"id": 1, "title": "A", "company": "c", "location": "remote",
                 "snippet": "s", "link": "l", "updated": "", "salary": ""},
                {"id": 2, "title": "B", "company": "c", "location": "remote",
                 "snippet": "s", "link": "l", "updated": "", "salary": ""}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/jooble/test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.jooble_api_key = Some("test-key".to_string());

        let store = Arc::new(MemoryJobStore::new());
        let service = build_service(config, store.clone()).await;

        let sources = vec!["jooble".to_string()];
        service
            .fetch_and_process_jobs_from_sources(&sources, 0, &CancellationToken::new())
            .await
            .expect("fetch should succeed");

        assert_eq!(store.row_count(), 2);
        assert!(store.get("jooble-1").is_some());
        assert!(store.get("jooble-2").is_some());
    }

    #[tokio::test]
    async fn test_unknown_requested_source_yields_noop() {
        let store = Arc::new(MemoryJobStore::new());
        let service = build_service(test_config("http://127.0.0.1:9"), store.clone()).await;

        let sources = vec!["linkedin".to_string()];
        service
            .fetch_and_process_jobs_from_sources(&sources, 0, &CancellationToken::new())
            .await
            .expect("unknown source is skipped, not an error");

        assert_eq!(store.row_count(), 0);
    }
}
