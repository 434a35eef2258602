//! End-to-end import runs against the in-memory store
//!
//! Each test drives the coordinator, the work queue and the engine together,
//! the same way the HTTP endpoints do.

mod common;

use common::{init_test_tracing, path_of, row, small_config, wait_for_end, write_csv, MemoryPipeline};
use csv_import_server::ingest::store::JobStore;
use csv_import_server::ingest::{
    CoordinatorError, CustomerRecord, ImportStatus, MemoryStore, WorkEvent,
};
use std::time::Duration;

#[ctor::ctor]
fn init() {
    init_test_tracing();
}

fn seeded(customer_id: &str) -> CustomerRecord {
    CustomerRecord {
        customer_id: customer_id.to_string(),
        first_name: "Existing".to_string(),
        last_name: String::new(),
        phone1: String::new(),
        phone2: String::new(),
        company: String::new(),
        city: String::new(),
        country: String::new(),
        email: "existing@example.com".to_string(),
        subscription_date: chrono::NaiveDate::default(),
        website: String::new(),
        description: String::new(),
        import_job_id: None,
    }
}

#[tokio::test]
async fn test_duplicate_rows_are_skipped_first_wins() {
    let csv = write_csv(&[row(1, "A", "first"), row(2, "A", "second"), row(3, "B", "third")]);
    let pipeline = MemoryPipeline::start(MemoryStore::new(), small_config(3));
    let mut events = pipeline.events();

    let started = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();
    let event = wait_for_end(&mut events, started.job_id).await;

    let WorkEvent::Completed { stats, .. } = event else {
        panic!("import failed: {event:?}");
    };
    assert_eq!(stats.rows_read, 3);
    assert_eq!(stats.rows_inserted, 2);
    assert_eq!(stats.rows_skipped, 1);

    assert_eq!(pipeline.store.customer_count().await, 2);
    let a = pipeline.store.customer("A").await.unwrap();
    assert_eq!(a.first_name, "first");
    assert_eq!(a.import_job_id, Some(started.job_id));

    let progress = pipeline.coordinator.get_progress().await.unwrap();
    assert_eq!(progress.status, ImportStatus::Completed);
    assert_eq!(progress.processed_rows, 3);
    assert_eq!(progress.percentage, 100.0);
    assert!(progress.finished_at.is_some());

    pipeline.worker.shutdown().await;
}

#[tokio::test]
async fn test_rows_already_stored_are_skipped() {
    let store = MemoryStore::new();
    store.seed_customer(seeded("B")).await;

    let csv = write_csv(&[row(1, "A", "ann"), row(2, "B", "bob"), row(3, "C", "cy")]);
    let pipeline = MemoryPipeline::start(store, small_config(3));
    let mut events = pipeline.events();

    let started = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();
    let event = wait_for_end(&mut events, started.job_id).await;
    assert!(matches!(event, WorkEvent::Completed { .. }));

    assert_eq!(pipeline.store.customer_count().await, 3);
    assert_eq!(pipeline.store.customer("B").await.unwrap().first_name, "Existing");

    let job = pipeline.store.get(started.job_id).await.unwrap().unwrap();
    assert_eq!(job.processed_rows, 3);

    pipeline.worker.shutdown().await;
}

#[tokio::test]
async fn test_second_run_of_same_file_inserts_nothing() {
    let csv = write_csv(&[row(1, "A", "ann"), row(2, "B", "bob")]);
    let pipeline = MemoryPipeline::start(MemoryStore::new(), small_config(2));
    let mut events = pipeline.events();

    let first = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();
    wait_for_end(&mut events, first.job_id).await;

    let second = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();
    let WorkEvent::Completed { stats, .. } = wait_for_end(&mut events, second.job_id).await else {
        panic!("second import failed");
    };

    assert_eq!(stats.rows_inserted, 0);
    assert_eq!(stats.rows_skipped, 2);
    assert_eq!(pipeline.store.customer_count().await, 2);
    assert_eq!(pipeline.store.job_count().await, 2);

    pipeline.worker.shutdown().await;
}

#[tokio::test]
async fn test_start_while_running_is_a_conflict() {
    let lines: Vec<String> = (0..6).map(|i| row(i, &format!("C{i}"), "name")).collect();
    let csv = write_csv(&lines);
    let store = MemoryStore::new().with_insert_delay(Duration::from_millis(100));
    let pipeline = MemoryPipeline::start(store, small_config(6));
    let mut events = pipeline.events();

    let started = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();

    let err = pipeline.coordinator.start(None).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Conflict { job_id: Some(id) } if id == started.job_id
    ));
    assert_eq!(pipeline.store.job_count().await, 1);

    let running = pipeline.coordinator.get_progress().await.unwrap();
    assert_eq!(running.job_id, started.job_id);
    assert!(running.percentage <= 100.0);

    wait_for_end(&mut events, started.job_id).await;
    pipeline.worker.shutdown().await;
}

#[tokio::test]
async fn test_progress_events_never_decrease_and_end_at_100() {
    let lines: Vec<String> = (0..7).map(|i| row(i, &format!("P{i}"), "name")).collect();
    let csv = write_csv(&lines);
    let pipeline = MemoryPipeline::start(MemoryStore::new(), small_config(7));
    let mut events = pipeline.events();

    let started = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();

    let mut seen = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap()
        {
            WorkEvent::Progress { job_id, percentage } if job_id == started.job_id => {
                seen.push(percentage)
            },
            WorkEvent::Completed { .. } => break,
            WorkEvent::Failed { error, .. } => panic!("import failed: {error}"),
            _ => {},
        }
    }

    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
    assert_eq!(seen.last(), Some(&100));

    pipeline.worker.shutdown().await;
}

#[tokio::test]
async fn test_missing_file_fails_job_and_frees_the_slot() {
    let pipeline = MemoryPipeline::start(MemoryStore::new(), small_config(3));
    let mut events = pipeline.events();

    let started = pipeline
        .coordinator
        .start(Some("/definitely/not/here.csv".to_string()))
        .await
        .unwrap();
    let event = wait_for_end(&mut events, started.job_id).await;
    assert!(matches!(event, WorkEvent::Failed { .. }));

    let progress = pipeline.coordinator.get_progress().await.unwrap();
    assert_eq!(progress.status, ImportStatus::Failed);
    assert!(progress.error.unwrap().contains("/definitely/not/here.csv"));

    let csv = write_csv(&[row(1, "A", "ann")]);
    assert!(pipeline.coordinator.start(Some(path_of(&csv))).await.is_ok());

    pipeline.worker.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_insert_retries_fail_the_job_without_progress() {
    let store = MemoryStore::new();
    store.fail_next_inserts(100);

    let csv = write_csv(&[row(1, "A", "ann"), row(2, "B", "bob")]);
    let mut config = small_config(2);
    config.retry.max_retries = 1;
    config.retry.backoff_ms = 1;
    let pipeline = MemoryPipeline::start(store, config);
    let mut events = pipeline.events();

    let started = pipeline.coordinator.start(Some(path_of(&csv))).await.unwrap();
    let event = wait_for_end(&mut events, started.job_id).await;
    assert!(matches!(event, WorkEvent::Failed { .. }));

    let job = pipeline.store.get(started.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, ImportStatus::Failed);
    assert_eq!(job.processed_rows, 0);
    assert_eq!(pipeline.store.customer_count().await, 0);

    pipeline.worker.shutdown().await;
}
