//! Shared helpers for the import server integration tests
//!
//! - CSV fixtures written to temp files
//! - An in-memory pipeline (store, engine, worker, coordinator)
//! - A PostgreSQL container with migrations applied (requires Docker)

#![allow(dead_code)]

use anyhow::{Context, Result};
use csv_import_server::ingest::{
    IngestConfig, IngestionEngine, JobCoordinator, LocalWorkQueue, MemoryStore, WorkEvent,
    WorkerHandle,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

pub const HEADER: &str = "Index,Customer Id,First Name,Last Name,Company,City,Country,\
Phone 1,Phone 2,Email,Subscription Date,Website,About Customer";

/// One CSV data line in the column order of [`HEADER`]
pub fn row(index: usize, customer_id: &str, first_name: &str) -> String {
    format!(
        "{index},{customer_id},{first_name},Baxter,Rasmussen Group,East Leonard,Chile,\
229.077.5154,397.884.0519x718,{first_name}@example.com,2020-08-24,http://www.stephenson.com/,"
    )
}

/// Write a CSV with the standard header and the given data lines
pub fn write_csv(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp csv");
    writeln!(file, "{HEADER}").expect("write header");
    for line in lines {
        writeln!(file, "{line}").expect("write row");
    }
    file.flush().expect("flush csv");
    file
}

pub fn path_of(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,csv_import_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

// ============================================================================
// In-memory pipeline
// ============================================================================

/// Store, worker and coordinator wired the way `main` wires the Postgres ones
pub struct MemoryPipeline {
    pub store: MemoryStore,
    pub queue: Arc<LocalWorkQueue>,
    pub coordinator: JobCoordinator,
    pub worker: WorkerHandle,
}

impl MemoryPipeline {
    pub fn start(store: MemoryStore, config: IngestConfig) -> Self {
        let engine = Arc::new(IngestionEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            &config,
        ));
        let (queue, worker) = LocalWorkQueue::start(engine, config.queue_capacity);
        let queue = Arc::new(queue);
        let coordinator = JobCoordinator::new(Arc::new(store.clone()), queue.clone(), &config);

        Self {
            store,
            queue,
            coordinator,
            worker,
        }
    }

    pub fn events(&self) -> broadcast::Receiver<WorkEvent> {
        self.queue.subscribe()
    }
}

pub fn small_config(total_rows: i64) -> IngestConfig {
    IngestConfig {
        batch_size: 2,
        total_rows,
        progress_every_batches: 1,
        ..Default::default()
    }
}

/// Wait for the terminal event of `job_id`
pub async fn wait_for_end(events: &mut broadcast::Receiver<WorkEvent>, job_id: Uuid) -> WorkEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            let id = match &event {
                WorkEvent::Completed { job_id, .. } | WorkEvent::Failed { job_id, .. } => *job_id,
                WorkEvent::Progress { .. } => continue,
            };
            if id == job_id {
                break event;
            }
        }
    })
    .await
    .expect("import did not finish in time")
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    /// Start a PostgreSQL container with migrations applied
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        csv_import_server::db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
