// Main entry point for the aggregator service

use std::sync::Arc;
use std::time::Duration;

use aggregator_core::config::Config;
use aggregator_core::domains::jobs::{
    JobServiceHandle, JobServiceImpl, JobStore, Scheduler, SkillsService,
};
use aggregator_core::kernel::{BaseEmbeddingService, BaseJobStore, Embedder};
use aggregator_core::server::{build_app, AppState};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bound on waiting for in-flight scheduler runs at shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aggregator_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Remote Job Radar Aggregator Service");

    // Load configuration
    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let store: Arc<dyn BaseJobStore> = Arc::new(JobStore::new(pool));
    let job_service = JobServiceHandle::warming_up();
    let scheduler: Arc<Mutex<Option<Scheduler>>> = Arc::new(Mutex::new(None));

    // Load the skill vector and publish the live pipeline in the background;
    // the HTTP server starts serving (with fail-fast entry points) right away
    {
        let config = Arc::clone(&config);
        let store = Arc::clone(&store);
        let handle = job_service.clone();
        let scheduler_slot = Arc::clone(&scheduler);

        tokio::spawn(async move {
            let embedder = match Embedder::new(&config) {
                Ok(embedder) => Arc::new(embedder),
                Err(err) => {
                    tracing::error!(error = %err, "Failed to initialize embedder");
                    return;
                }
            };

            // Advisory: failure is logged inside and does not block
            embedder.warmup().await;

            let embedder: Arc<dyn BaseEmbeddingService> = embedder;
            let skills = SkillsService::new(Arc::clone(&embedder), config.skills_file.clone());

            tracing::info!("Loading skills configuration and vector for job service");
            let skill_vec = match skills.load_skill_vector(&CancellationToken::new()).await {
                Ok(vector) => vector,
                Err(err) => {
                    // The process stays in warming-up; entry points keep
                    // failing fast
                    tracing::error!(error = %err, "Failed to load skill vector");
                    return;
                }
            };

            let service =
                match JobServiceImpl::new(store, embedder, skill_vec, Arc::clone(&config)) {
                    Ok(service) => Arc::new(service),
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to construct job service");
                        return;
                    }
                };

            handle.publish(service.clone()).await;
            tracing::info!("Skill vector loaded, job service initialized");

            let mut sched = Scheduler::new(
                service,
                config.fetch_interval,
                config.score_interval,
                config.run_initial_fetch,
            );
            sched.start();
            *scheduler_slot.lock().await = Some(sched);
            tracing::info!("Scheduler started");
        });
    }

    // Build application
    let app = build_app(AppState {
        store,
        job_service,
        config: Arc::clone(&config),
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Graceful shutdown: stop periodic tasks, bounded by a deadline
    tracing::info!("Starting graceful shutdown...");
    if let Some(mut sched) = scheduler.lock().await.take() {
        sched.stop(SHUTDOWN_DEADLINE).await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
