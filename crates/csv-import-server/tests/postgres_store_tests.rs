//! Postgres store and pipeline tests
//!
//! These tests require Docker to be running. Run with:
//!
//! ```bash
//! cargo test --test postgres_store_tests -- --ignored --nocapture
//! ```

mod common;

use common::{init_test_tracing, path_of, row, write_csv, TestPostgres};
use csv_import_server::ingest::models::NewImportJob;
use csv_import_server::ingest::queue::NullReporter;
use csv_import_server::ingest::store::{CustomerStore, InsertOutcome, JobStore, StoreError};
use csv_import_server::ingest::{
    CustomerRecord, IngestConfig, IngestionEngine, ImportStatus, PgCustomerStore, PgJobStore,
};
use std::sync::Arc;

#[ctor::ctor]
fn init() {
    init_test_tracing();
}

fn record(customer_id: &str) -> CustomerRecord {
    CustomerRecord {
        customer_id: customer_id.to_string(),
        first_name: "Sheryl".to_string(),
        last_name: "Baxter".to_string(),
        phone1: "229.077.5154".to_string(),
        phone2: String::new(),
        company: "Rasmussen Group".to_string(),
        city: "East Leonard".to_string(),
        country: "Chile".to_string(),
        email: "zunigavanessa@smith.info".to_string(),
        subscription_date: chrono::NaiveDate::from_ymd_opt(2020, 8, 24).unwrap(),
        website: "http://www.stephenson.com/".to_string(),
        description: String::new(),
        import_job_id: None,
    }
}

fn new_job(total_rows: i64) -> NewImportJob {
    NewImportJob {
        file_path: "customers.csv".to_string(),
        total_rows,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_batch_skips_existing_keys() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let customers = PgCustomerStore::new(pg.pool().clone());

    let inserted = customers
        .insert_batch(&[record("A"), record("B")])
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    // Re-running the same batch is a no-op
    let inserted = customers
        .insert_batch(&[record("B"), record("C")])
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let existing = customers
        .existing_customer_ids(&["A".to_string(), "C".to_string(), "Z".to_string()])
        .await
        .unwrap();
    assert_eq!(existing.len(), 2);
    assert!(existing.contains("A") && existing.contains("C"));

    assert_eq!(
        customers.insert_one(&record("A")).await.unwrap(),
        InsertOutcome::Duplicate
    );
    assert_eq!(
        customers.insert_one(&record("D")).await.unwrap(),
        InsertOutcome::Inserted
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_only_one_job_in_progress() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let jobs = PgJobStore::new(pg.pool().clone());

    let first = jobs.create(new_job(10)).await.unwrap();
    assert_eq!(first.status, ImportStatus::InProgress);
    assert!(first.started_at.is_some());

    let err = jobs.create(new_job(10)).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation(_)));

    assert_eq!(jobs.increment_processed(first.id, 4).await.unwrap(), 4);
    assert_eq!(jobs.increment_processed(first.id, 6).await.unwrap(), 10);

    assert!(jobs.complete(first.id).await.unwrap());
    // Terminal states are sticky
    assert!(!jobs.fail(first.id, "late failure").await.unwrap());

    let second = jobs.create(new_job(10)).await.unwrap();
    assert_eq!(jobs.latest().await.unwrap().unwrap().id, second.id);
    assert_eq!(jobs.find_in_progress().await.unwrap().unwrap().id, second.id);

    let done = jobs.get(first.id).await.unwrap().unwrap();
    assert_eq!(done.status, ImportStatus::Completed);
    assert_eq!(done.processed_rows, 10);
    assert!(done.finished_at.is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_engine_run_against_postgres() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let customers = Arc::new(PgCustomerStore::new(pg.pool().clone()));
    let jobs = Arc::new(PgJobStore::new(pg.pool().clone()));

    let config = IngestConfig {
        batch_size: 2,
        total_rows: 3,
        ..Default::default()
    };
    let engine = IngestionEngine::new(customers, jobs.clone(), &config);

    let csv = write_csv(&[row(1, "A", "first"), row(2, "A", "second"), row(3, "B", "third")]);
    let job = jobs.create(new_job(3)).await.unwrap();

    let stats = engine
        .run(&path_of(&csv), job.id, &NullReporter)
        .await
        .unwrap();
    assert_eq!(stats.rows_inserted, 2);
    assert_eq!(stats.rows_skipped, 1);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers")
        .fetch_one(pg.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);

    let (first_name,): (String,) =
        sqlx::query_as("SELECT first_name FROM customers WHERE customer_id = 'A'")
            .fetch_one(pg.pool())
            .await
            .unwrap();
    assert_eq!(first_name, "first");

    let job = jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, ImportStatus::Completed);
    assert_eq!(job.processed_rows, 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_interrupted_job_is_failed_on_recovery() {
    let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
    let jobs = PgJobStore::new(pg.pool().clone());

    let done = jobs.create(new_job(10)).await.unwrap();
    jobs.complete(done.id).await.unwrap();
    let orphan = jobs.create(new_job(10)).await.unwrap();

    let failed = jobs.fail_in_progress("server restarted").await.unwrap();
    assert_eq!(failed, vec![orphan.id]);

    let orphan = jobs.get(orphan.id).await.unwrap().unwrap();
    assert_eq!(orphan.status, ImportStatus::Failed);
    assert_eq!(orphan.error.as_deref(), Some("server restarted"));
    assert!(orphan.finished_at.is_some());
    assert_eq!(
        jobs.get(done.id).await.unwrap().unwrap().status,
        ImportStatus::Completed
    );

    // The single-flight slot is free again
    assert!(jobs.create(new_job(10)).await.is_ok());
}
