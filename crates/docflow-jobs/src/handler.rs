//! Job handler trait and execution context.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use docflow_core::{CancelFlag, Job, QueueName};

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    progress_callback: Option<ProgressCallback>,
    cancel: CancelFlag,
}

impl JobContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            progress_callback: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Attach a shared cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress (0–100) to the queue.
    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// The cancellation flag for this execution, checked between stages.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// The document this job references, if any.
    pub fn document_id(&self) -> Option<Uuid> {
        self.job.document_id
    }

    /// The job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed permanently; no retry.
    Failed(String),
    /// Transient failure; the queue retries with backoff until attempts are
    /// exhausted.
    Retry(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The queue this handler serves.
    fn queue(&self) -> QueueName;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// No-op handler for testing.
pub struct NoOpHandler {
    queue: QueueName,
}

impl NoOpHandler {
    pub fn new(queue: QueueName) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn queue(&self) -> QueueName {
        self.queue
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(50, Some("Processing..."));
        ctx.report_progress(100, Some("Done"));
        JobResult::Success(None)
    }
}
