//! Scheduler: named queues, worker pools, stall sweeper, lifecycle control.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use docflow_core::{
    defaults, CancelFlag, Error, Job, JobRepository, JobStatusReport, QueueName, QueueStats,
    Result,
};

use crate::handler::JobHandler;
use crate::worker::{JobEvent, Worker};

/// Configuration for the scheduler and its workers.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Polling interval when a queue is empty (milliseconds).
    pub poll_interval_ms: u64,
    /// Per-job execution timeout in seconds.
    pub job_timeout_secs: u64,
    /// A job with no progress report for this long is considered stalled.
    pub stall_timeout_secs: u64,
    /// Interval between stalled-job sweeps (seconds).
    pub stall_sweep_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            stall_timeout_secs: defaults::JOB_STALL_TIMEOUT_SECS,
            stall_sweep_interval_secs: defaults::STALL_SWEEP_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_POLL_INTERVAL_MS` | `200` | Polling interval when queue is empty |
    /// | `JOB_TIMEOUT_SECS` | `300` | Per-job execution timeout |
    /// | `JOB_STALL_TIMEOUT_SECS` | `30` | Stall detection threshold |
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_u64("JOB_POLL_INTERVAL_MS") {
            config.poll_interval_ms = v;
        }
        if let Some(v) = env_u64("JOB_TIMEOUT_SECS") {
            config.job_timeout_secs = v;
        }
        if let Some(v) = env_u64("JOB_STALL_TIMEOUT_SECS") {
            config.stall_timeout_secs = v;
        }
        config
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    pub fn with_stall_timeout(mut self, secs: u64) -> Self {
        self.stall_timeout_secs = secs;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

/// Job scheduler over named queues.
///
/// Owns the worker pools, the pause flags, the stall sweeper, and the
/// in-flight cancellation registry. Injected as an explicit dependency into
/// whatever enqueues or processes work; there is no global queue.
pub struct Scheduler {
    repo: Arc<dyn JobRepository>,
    config: SchedulerConfig,
    event_tx: broadcast::Sender<JobEvent>,
    paused: Arc<RwLock<HashSet<QueueName>>>,
    active: Arc<RwLock<HashMap<Uuid, CancelFlag>>>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn JobRepository>, config: SchedulerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            repo,
            config,
            event_tx,
            paused: Arc::new(RwLock::new(HashSet::new())),
            active: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// Subscribe to job lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Enqueue a job. Visible to workers once `delay` elapses.
    pub async fn enqueue(
        &self,
        queue: QueueName,
        document_id: Option<Uuid>,
        payload: Option<JsonValue>,
        priority: i32,
        delay: Duration,
    ) -> Result<Uuid> {
        if *self.shutdown_tx.borrow() {
            return Err(Error::Job("Scheduler is shutting down".to_string()));
        }
        let job = Job::new(queue, document_id, payload, priority, delay)?;
        let job_id = self.repo.create(job).await?;
        info!(%job_id, %queue, priority, "Job enqueued");
        Ok(job_id)
    }

    /// Start a worker pool of `concurrency` workers for a queue.
    pub async fn process(
        &self,
        queue: QueueName,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<()> {
        if handler.queue() != queue {
            return Err(Error::Config(format!(
                "Handler serves queue {}, cannot process {}",
                handler.queue(),
                queue
            )));
        }
        if concurrency == 0 {
            return Err(Error::InvalidInput(
                "Concurrency must be at least 1".to_string(),
            ));
        }

        self.start_sweeper().await;

        let mut workers = self.workers.lock().await;
        for _ in 0..concurrency {
            let worker = Worker {
                repo: self.repo.clone(),
                queue,
                handler: handler.clone(),
                config: self.config.clone(),
                event_tx: self.event_tx.clone(),
                paused: self.paused.clone(),
                active: self.active.clone(),
                shutdown: self.shutdown_tx.subscribe(),
            };
            workers.push(tokio::spawn(worker.run()));
        }
        info!(%queue, concurrency, "Worker pool started");
        Ok(())
    }

    /// Point-in-time status for one job.
    pub async fn status(&self, job_id: Uuid) -> Result<JobStatusReport> {
        let job = self
            .repo
            .get(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))?;
        Ok(JobStatusReport {
            state: job.status,
            progress: job.progress_percent,
            attempts_made: job.attempts,
            error: job.error_message,
        })
    }

    /// Per-queue statistics.
    pub async fn stats(&self, queue: QueueName) -> Result<QueueStats> {
        self.repo.stats(queue).await
    }

    /// Remove terminal jobs older than `age`; returns the count removed.
    pub async fn cleanup_older_than(&self, age: Duration) -> Result<usize> {
        let removed = self.repo.cleanup_older_than(age).await?;
        info!(removed, "Cleaned up terminal jobs");
        Ok(removed)
    }

    /// Pause claiming on a queue. In-flight jobs finish.
    pub async fn pause(&self, queue: QueueName) {
        self.paused.write().await.insert(queue);
        info!(%queue, "Queue paused");
    }

    /// Resume claiming on a queue.
    pub async fn resume(&self, queue: QueueName) {
        self.paused.write().await.remove(&queue);
        info!(%queue, "Queue resumed");
    }

    /// Whether a queue is currently paused.
    pub async fn is_paused(&self, queue: QueueName) -> bool {
        self.paused.read().await.contains(&queue)
    }

    /// Cancel a job.
    ///
    /// A job that has not started is removed from the queue (returns `true`).
    /// An in-progress job cannot be preempted: its cancellation flag is set
    /// and takes effect at the next stage boundary (returns `false`).
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        if self.repo.cancel_pending(job_id).await? {
            info!(%job_id, "Cancelled queued job");
            return Ok(true);
        }
        if let Some(flag) = self.active.read().await.get(&job_id) {
            flag.cancel();
            info!(%job_id, "Cancellation requested for in-progress job");
        }
        Ok(false)
    }

    /// Stop accepting work, wait up to `grace` for in-flight jobs, then
    /// abort the remaining workers.
    pub async fn shutdown(&self, grace: Duration) -> Result<()> {
        info!(grace_secs = grace.as_secs(), "Scheduler shutting down");
        let _ = self.shutdown_tx.send(true);

        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.abort();
        }

        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let drained = tokio::time::timeout(grace, futures::future::join_all(handles)).await;
        if drained.is_err() {
            warn!("Grace period elapsed, force-closing workers");
            for abort in aborts {
                abort.abort();
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Start the stalled-job sweeper once.
    async fn start_sweeper(&self) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }

        let repo = self.repo.clone();
        let stall_timeout = Duration::from_secs(self.config.stall_timeout_secs);
        let interval = Duration::from_secs(self.config.stall_sweep_interval_secs);
        let mut shutdown = self.shutdown_tx.subscribe();

        *sweeper = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(interval) => {}
                }
                match repo.requeue_stalled(stall_timeout).await {
                    Ok(requeued) if !requeued.is_empty() => {
                        warn!(count = requeued.len(), "Recovered stalled jobs");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Stall sweep failed"),
                }
            }
        }));
    }
}
