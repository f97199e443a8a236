//! In-memory store implementing the persistence collaborator traits.
//!
//! The relational layer is outside this subsystem; this store gives the
//! queue, CLI, and tests a working implementation of the same narrow
//! interfaces. Job state transitions are validated through the core state
//! machine, and claiming enforces the per-document serialization invariant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use docflow_core::{
    Document, DocumentRepository, DocumentStatus, Error, Job, JobRepository, JobStatus, QueueName,
    QueueStats, Result,
};

/// Job record plus the enqueue sequence number used for FIFO tie-breaks.
#[derive(Debug, Clone)]
struct StoredJob {
    job: Job,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    documents: RwLock<HashMap<Uuid, Document>>,
    jobs: RwLock<HashMap<Uuid, StoredJob>>,
}

/// In-memory document and job store.
///
/// Cloning is cheap; clones share the same underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    seq: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a validated status transition or return a job error.
    fn transition(job: &mut Job, next: JobStatus) -> Result<()> {
        if !job.status.can_transition_to(next) {
            return Err(Error::Job(format!(
                "Invalid job transition {} -> {} for job {}",
                job.status, next, job.id
            )));
        }
        job.status = next;
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn load(&self, id: Uuid) -> Result<Document> {
        let documents = self.inner.documents.read().await;
        documents
            .get(&id)
            .cloned()
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn save(&self, mut doc: Document) -> Result<()> {
        doc.updated_at = Utc::now();
        let mut documents = self.inner.documents.write().await;
        documents.insert(doc.id, doc);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut documents = self.inner.documents.write().await;
        // Embedding records live on the document, so removal cascades.
        documents.remove(&id).ok_or(Error::DocumentNotFound(id))?;
        Ok(())
    }

    async fn counts_by_status(&self) -> Result<HashMap<DocumentStatus, i64>> {
        let documents = self.inner.documents.read().await;
        let mut counts = HashMap::new();
        for doc in documents.values() {
            *counts.entry(doc.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn create(&self, mut job: Job) -> Result<Uuid> {
        Self::transition(&mut job, JobStatus::Queued)?;
        let id = job.id;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.inner.jobs.write().await;
        jobs.insert(id, StoredJob { job, seq });
        Ok(id)
    }

    async fn claim_next(&self, queue: QueueName) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut jobs = self.inner.jobs.write().await;

        // Documents that already have a processing job in flight are skipped,
        // serializing writes to each document record.
        let busy_documents: Vec<Uuid> = jobs
            .values()
            .filter(|s| {
                s.job.queue == QueueName::DocumentProcessing
                    && s.job.status == JobStatus::InProgress
            })
            .filter_map(|s| s.job.document_id)
            .collect();

        let candidate = jobs
            .values()
            .filter(|s| s.job.queue == queue && s.job.status == JobStatus::Queued)
            .filter(|s| s.job.visible_at <= now)
            .filter(|s| {
                queue != QueueName::DocumentProcessing
                    || s.job
                        .document_id
                        .map(|d| !busy_documents.contains(&d))
                        .unwrap_or(true)
            })
            .min_by_key(|s| (s.job.priority, s.seq))
            .map(|s| s.job.id);

        let Some(id) = candidate else {
            return Ok(None);
        };

        let stored = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::Internal("Claimed job vanished".to_string()))?;
        Self::transition(&mut stored.job, JobStatus::InProgress)?;
        stored.job.attempts += 1;
        stored.job.started_at = Some(now);
        stored.job.last_progress_at = Some(now);
        debug!(job_id = %id, %queue, attempt = stored.job.attempts, "Claimed job");
        Ok(Some(stored.job.clone()))
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        percent: i32,
        message: Option<&str>,
    ) -> Result<()> {
        let mut jobs = self.inner.jobs.write().await;
        let stored = jobs.get_mut(&job_id).ok_or(Error::JobNotFound(job_id))?;
        if stored.job.status != JobStatus::InProgress {
            return Err(Error::Job(format!(
                "Cannot report progress on {} job {}",
                stored.job.status, job_id
            )));
        }
        stored.job.progress_percent = percent.clamp(0, 100);
        stored.job.progress_message = message.map(String::from);
        stored.job.last_progress_at = Some(Utc::now());
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut jobs = self.inner.jobs.write().await;
        let stored = jobs.get_mut(&job_id).ok_or(Error::JobNotFound(job_id))?;
        Self::transition(&mut stored.job, JobStatus::Completed)?;
        stored.job.result = result;
        stored.job.progress_percent = 100;
        stored.job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut jobs = self.inner.jobs.write().await;
        let stored = jobs.get_mut(&job_id).ok_or(Error::JobNotFound(job_id))?;
        Self::transition(&mut stored.job, JobStatus::Failed)?;
        stored.job.error_message = Some(error.to_string());
        stored.job.failed_at = Some(Utc::now());
        Ok(())
    }

    async fn retry(&self, job_id: Uuid, error: &str, delay: Duration) -> Result<bool> {
        let mut jobs = self.inner.jobs.write().await;
        let stored = jobs.get_mut(&job_id).ok_or(Error::JobNotFound(job_id))?;

        if !stored.job.can_retry() {
            Self::transition(&mut stored.job, JobStatus::Failed)?;
            stored.job.error_message = Some(error.to_string());
            stored.job.failed_at = Some(Utc::now());
            return Ok(false);
        }

        Self::transition(&mut stored.job, JobStatus::Queued)?;
        stored.job.error_message = Some(error.to_string());
        stored.job.progress_percent = 0;
        stored.job.progress_message = None;
        stored.job.visible_at = Utc::now()
            + chrono::Duration::from_std(delay)
                .map_err(|_| Error::InvalidInput("Backoff delay out of range".to_string()))?;
        Ok(true)
    }

    async fn requeue_stalled(&self, stall_timeout: Duration) -> Result<Vec<Uuid>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(stall_timeout)
                .map_err(|_| Error::InvalidInput("Stall timeout out of range".to_string()))?;
        let mut jobs = self.inner.jobs.write().await;
        let mut requeued = Vec::new();

        for stored in jobs.values_mut() {
            if stored.job.status != JobStatus::InProgress {
                continue;
            }
            let last = stored.job.last_progress_at.unwrap_or(stored.job.created_at);
            if last > cutoff {
                continue;
            }

            if stored.job.stall_recovered {
                // Second stall: give up rather than loop forever.
                Self::transition(&mut stored.job, JobStatus::Failed)?;
                stored.job.error_message = Some(
                    Error::QueueTimeout(format!(
                        "Job {} stalled after recovery",
                        stored.job.id
                    ))
                    .to_string(),
                );
                stored.job.failed_at = Some(Utc::now());
                warn!(job_id = %stored.job.id, "Stalled job failed after one recovery");
            } else {
                Self::transition(&mut stored.job, JobStatus::Queued)?;
                stored.job.stall_recovered = true;
                stored.job.visible_at = Utc::now();
                stored.job.progress_percent = 0;
                stored.job.progress_message = None;
                warn!(job_id = %stored.job.id, "Re-queued stalled job");
                requeued.push(stored.job.id);
            }
        }
        Ok(requeued)
    }

    async fn cancel_pending(&self, job_id: Uuid) -> Result<bool> {
        let mut jobs = self.inner.jobs.write().await;
        match jobs.get(&job_id) {
            Some(stored)
                if matches!(stored.job.status, JobStatus::Pending | JobStatus::Queued) =>
            {
                jobs.remove(&job_id);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(Error::JobNotFound(job_id)),
        }
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let jobs = self.inner.jobs.read().await;
        Ok(jobs.get(&job_id).map(|s| s.job.clone()))
    }

    async fn stats(&self, queue: QueueName) -> Result<QueueStats> {
        let now = Utc::now();
        let jobs = self.inner.jobs.read().await;
        let mut stats = QueueStats::default();
        for stored in jobs.values().filter(|s| s.job.queue == queue) {
            match stored.job.status {
                JobStatus::Pending => stats.delayed += 1,
                JobStatus::Queued if stored.job.visible_at > now => stats.delayed += 1,
                JobStatus::Queued => stats.waiting += 1,
                JobStatus::InProgress => stats.active += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn cleanup_older_than(&self, age: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(age)
                .map_err(|_| Error::InvalidInput("Cleanup age out of range".to_string()))?;
        let mut jobs = self.inner.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, stored| match stored.job.terminal_at() {
            Some(at) => at > cutoff,
            None => true,
        });
        Ok(before - jobs.len())
    }
}
