//! CSV Import Server - Main entry point

use anyhow::Result;
use csv_import_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

use csv_import_server::{
    api::{self, AppState},
    config::Config,
    db,
    ingest::{IngestionEngine, JobCoordinator, LocalWorkQueue, PgCustomerStore, PgJobStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so LOG_* variables are visible to the logger
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .log_file_prefix("csv-import-server")
        .filter_directives("csv_import_server=debug,tower_http=debug,sqlx=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    info!("Starting CSV Import Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    let customers = Arc::new(PgCustomerStore::new(db_pool.clone()));
    let jobs = Arc::new(PgJobStore::new(db_pool.clone()));

    let engine = Arc::new(IngestionEngine::new(customers, jobs.clone(), &config.ingest));
    let (queue, worker) = LocalWorkQueue::start(engine, config.ingest.queue_capacity);
    let coordinator = Arc::new(JobCoordinator::new(jobs, Arc::new(queue), &config.ingest));

    // Nothing has been submitted yet, so any IN_PROGRESS job is an orphan
    let recovered = coordinator.recover().await?;
    if recovered > 0 {
        warn!(recovered, "Failed import jobs left over from a previous run");
    }

    info!(
        csv_file_path = %config.ingest.csv_file_path,
        batch_size = config.ingest.batch_size,
        dedup_strategy = ?config.ingest.dedup_strategy,
        "Import worker started"
    );

    let state = AppState {
        db: db_pool.clone(),
        coordinator,
    };
    let app = api::create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The running import finishes its current batch loop; queued ones are failed
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    info!("Waiting up to {} seconds for the import worker to stop", timeout.as_secs());
    if tokio::time::timeout(timeout, worker.shutdown()).await.is_err() {
        warn!("Import worker did not stop in time");
    }

    db_pool.close().await;
    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
