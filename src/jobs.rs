//! Background job runner with status polling
//!
//! A handler submits work, gets an id back immediately, and clients poll
//! `status(id)` until the job reaches `completed` or `failed`.
//!
//! # Lifecycle
//! ```text
//! pending → processing → completed
//!                     └→ failed
//! ```
//!
//! Records live in process memory. A periodic sweep deletes every record
//! older than the retention window, whatever its status, so a job stuck in
//! `pending` or `processing` past the window disappears too.

use crate::metrics::{JobEvent, Metrics};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Default age after which a job record is swept (30 minutes)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 60);
/// Default interval between sweeps (1 hour)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One unit of background work as seen by pollers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Value,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    #[serde(skip)]
    created: Instant,
}

impl Job {
    fn new(id: String, job_type: String, payload: Value) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            id,
            job_type,
            payload,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at,
            created: Instant::now(),
        }
    }

    /// Time since submission
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }
}

/// Boxed job body handed to a spawner
pub type JobTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Where job bodies run
///
/// Production uses `TokioSpawner`; tests can hold tasks back to observe the
/// `pending` state deterministically.
pub trait JobSpawner: Send + Sync {
    fn spawn(&self, task: JobTask);
}

/// Runs each job on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl JobSpawner for TokioSpawner {
    fn spawn(&self, task: JobTask) {
        tokio::spawn(task);
    }
}

type JobTable = Arc<Mutex<HashMap<String, Job>>>;

/// Submits, tracks, and expires background jobs
pub struct JobRunner {
    jobs: JobTable,
    spawner: Arc<dyn JobSpawner>,
    retention: Duration,
    sweep_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl JobRunner {
    pub fn new(retention: Duration, sweep_interval: Duration) -> Self {
        Self::with_spawner(retention, sweep_interval, Arc::new(TokioSpawner))
    }

    pub fn with_spawner(
        retention: Duration,
        sweep_interval: Duration,
        spawner: Arc<dyn JobSpawner>,
    ) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            spawner,
            retention,
            sweep_interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Register a job and start `processor` in the background
    ///
    /// Returns the job id without waiting for the processor. Processor
    /// errors and panics are recorded on the job and never reach the caller.
    pub fn submit<F, Fut, E>(&self, job_type: &str, payload: Value, processor: F) -> String
    where
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let job = Job::new(id.clone(), job_type.to_string(), payload.clone());
        lock(&self.jobs).insert(id.clone(), job);

        if let Some(metrics) = &self.metrics {
            metrics.job_event(JobEvent::Submitted);
        }
        tracing::info!(job_id = %id, job_type = %job_type, "Job submitted");

        let jobs = self.jobs.clone();
        let metrics = self.metrics.clone();
        let job_id = id.clone();
        self.spawner.spawn(Box::pin(async move {
            set_status(&jobs, &job_id, JobStatus::Processing);
            tracing::debug!(job_id = %job_id, "Job processing");

            let outcome = AssertUnwindSafe(processor(payload)).catch_unwind().await;
            let outcome = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("job processor panicked".to_string()),
            };

            let event = match outcome {
                Ok(value) => {
                    if let Some(job) = lock(&jobs).get_mut(&job_id) {
                        job.result = Some(value);
                        job.status = JobStatus::Completed;
                    }
                    tracing::info!(job_id = %job_id, "Job completed");
                    JobEvent::Completed
                }
                Err(message) => {
                    tracing::error!(job_id = %job_id, error = %message, "Job failed");
                    if let Some(job) = lock(&jobs).get_mut(&job_id) {
                        job.error = Some(message);
                        job.status = JobStatus::Failed;
                    }
                    JobEvent::Failed
                }
            };
            if let Some(metrics) = metrics {
                metrics.job_event(event);
            }
        }));

        id
    }

    /// Current record for `id`, if it exists and has not been swept
    pub fn status(&self, id: &str) -> Option<Job> {
        lock(&self.jobs).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.jobs).is_empty()
    }

    /// Delete jobs older than the retention window; returns how many
    pub fn sweep(&self) -> usize {
        let mut jobs = lock(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, job| job.age() <= self.retention);
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::debug!(removed = removed, remaining = jobs.len(), "Swept expired jobs");
        }
        removed
    }

    /// Spawn the periodic retention sweep
    ///
    /// A second task watches the sweep loop and logs if it ever stops.
    pub fn start_retention_sweep(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.sweep_interval;
        let handle = tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                retention_secs = self.retention.as_secs(),
                "Starting job retention sweep"
            );
            loop {
                tokio::time::sleep(interval).await;
                self.sweep();
            }
        });

        tokio::spawn(async move {
            match handle.await {
                Ok(()) => {
                    tracing::error!(
                        "Job retention sweep terminated unexpectedly. \
                        Finished jobs will accumulate until restart."
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "Job retention sweep panicked. \
                        Finished jobs will accumulate until restart."
                    );
                }
            }
        })
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL)
    }
}

fn lock(jobs: &JobTable) -> MutexGuard<'_, HashMap<String, Job>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_status(jobs: &JobTable, id: &str, status: JobStatus) {
    if let Some(job) = lock(jobs).get_mut(id) {
        job.status = status;
    }
}
