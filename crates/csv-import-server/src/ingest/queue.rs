//! In-process work queue
//!
//! Submissions travel as [`CsvImportJob`] messages over a bounded channel to a
//! single worker task, which runs the engine for one job at a time. Outcomes
//! flow back as [`WorkEvent`]s on a broadcast channel and as a per-job
//! [`WorkState`] snapshot.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::engine::IngestionEngine;
use super::jobs::{CsvImportJob, IngestStats};

const EVENT_CAPACITY: usize = 256;

/// Finished jobs whose [`WorkState`] stays queryable
const RETAINED_FINISHED_JOBS: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Work queue is full")]
    Full,

    #[error("Work queue is shut down")]
    Closed,
}

/// Accepts work for asynchronous execution
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, job: CsvImportJob) -> Result<(), QueueError>;
}

/// Receives incremental progress from a running job
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, job_id: Uuid, percentage: u8);
}

/// Reporter that drops every update
pub struct NullReporter;

#[async_trait]
impl ProgressReporter for NullReporter {
    async fn report(&self, _job_id: Uuid, _percentage: u8) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkEvent {
    Progress { job_id: Uuid, percentage: u8 },
    Completed { job_id: Uuid, stats: IngestStats },
    Failed { job_id: Uuid, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkState {
    Queued,
    Running { percentage: u8 },
    Completed { stats: IngestStats },
    Failed { error: String },
}

impl WorkState {
    fn is_terminal(&self) -> bool {
        matches!(self, WorkState::Completed { .. } | WorkState::Failed { .. })
    }
}

/// Per-job states; only the most recent finished jobs are kept
#[derive(Default)]
struct JobStates {
    states: HashMap<Uuid, WorkState>,
    finished: VecDeque<Uuid>,
}

impl JobStates {
    fn set(&mut self, job_id: Uuid, state: WorkState) {
        let terminal = state.is_terminal();
        self.states.insert(job_id, state);
        if terminal {
            self.finished.push_back(job_id);
            while self.finished.len() > RETAINED_FINISHED_JOBS {
                if let Some(evicted) = self.finished.pop_front() {
                    self.states.remove(&evicted);
                }
            }
        }
    }

    fn get(&self, job_id: &Uuid) -> Option<&WorkState> {
        self.states.get(job_id)
    }

    fn remove(&mut self, job_id: &Uuid) {
        self.states.remove(job_id);
    }
}

type States = Arc<RwLock<JobStates>>;

/// Publishes progress as events and state updates
struct QueueReporter {
    events: broadcast::Sender<WorkEvent>,
    states: States,
}

#[async_trait]
impl ProgressReporter for QueueReporter {
    async fn report(&self, job_id: Uuid, percentage: u8) {
        self.states
            .write()
            .await
            .set(job_id, WorkState::Running { percentage });
        // No subscribers is fine
        let _ = self.events.send(WorkEvent::Progress { job_id, percentage });
    }
}

/// Bounded channel feeding a single ingestion worker
#[derive(Clone)]
pub struct LocalWorkQueue {
    sender: mpsc::Sender<CsvImportJob>,
    events: broadcast::Sender<WorkEvent>,
    states: States,
}

/// Owns the worker task
pub struct WorkerHandle {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop taking new work and wait for the current job to finish
    ///
    /// Jobs still queued are marked failed.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Import worker terminated abnormally");
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl LocalWorkQueue {
    /// Spawn the worker and return the queue feeding it
    pub fn start(engine: Arc<IngestionEngine>, capacity: usize) -> (Self, WorkerHandle) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let states: States = Arc::default();
        let shutdown = CancellationToken::new();

        let reporter = QueueReporter {
            events: events.clone(),
            states: states.clone(),
        };
        let handle = tokio::spawn(Self::run(receiver, engine, reporter, shutdown.clone()));

        (
            Self {
                sender,
                events,
                states,
            },
            WorkerHandle { shutdown, handle },
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self, job_id: Uuid) -> Option<WorkState> {
        self.states.read().await.get(&job_id).cloned()
    }

    async fn run(
        mut receiver: mpsc::Receiver<CsvImportJob>,
        engine: Arc<IngestionEngine>,
        reporter: QueueReporter,
        shutdown: CancellationToken,
    ) {
        info!("Import worker started");

        loop {
            let job = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(job) => job,
                    None => break,
                },
            };

            debug!(job_id = %job.job_id, file_path = %job.file_path, "Import job dequeued");
            reporter
                .states
                .write()
                .await
                .set(job.job_id, WorkState::Running { percentage: 0 });

            let (state, event) = match engine.run(&job.file_path, job.job_id, &reporter).await {
                Ok(stats) => (
                    WorkState::Completed {
                        stats: stats.clone(),
                    },
                    WorkEvent::Completed {
                        job_id: job.job_id,
                        stats,
                    },
                ),
                Err(e) => (
                    WorkState::Failed {
                        error: e.to_string(),
                    },
                    WorkEvent::Failed {
                        job_id: job.job_id,
                        error: e.to_string(),
                    },
                ),
            };

            reporter.states.write().await.set(job.job_id, state);
            let _ = reporter.events.send(event);
        }

        receiver.close();
        while let Ok(job) = receiver.try_recv() {
            let reason = "import worker shut down before the job started";
            engine.abandon(job.job_id, reason).await;
            reporter.states.write().await.set(
                job.job_id,
                WorkState::Failed {
                    error: reason.to_string(),
                },
            );
        }

        info!("Import worker stopped");
    }
}

#[async_trait]
impl WorkQueue for LocalWorkQueue {
    async fn enqueue(&self, job: CsvImportJob) -> Result<(), QueueError> {
        let job_id = job.job_id;
        self.states.write().await.set(job_id, WorkState::Queued);

        if let Err(e) = self.sender.try_send(job) {
            self.states.write().await.remove(&job_id);
            warn!(job_id = %job_id, "Import job rejected by work queue");
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            });
        }

        debug!(job_id = %job_id, "Import job enqueued");
        Ok(())
    }
}
