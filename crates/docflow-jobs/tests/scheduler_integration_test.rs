//! End-to-end tests for the scheduler: dispatch, retry, serialization,
//! pause/resume, timeout, and shutdown against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use docflow_core::{
    Document, DocumentRepository, DocumentStatus, Job, JobRepository, JobStatus, QueueName,
    StageFlags,
};
use docflow_index::MemoryVectorIndex;
use docflow_inference::{Classifier, EmbeddingChain, Summarizer};
use docflow_jobs::{
    DocumentJobHandler, DocumentProcessor, ExtractionRegistry, JobContext, JobHandler, JobResult,
    Scheduler, SchedulerConfig,
};
use docflow_store::MemoryStore;

fn fast_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .with_poll_interval(20)
        .with_job_timeout(2)
        .with_stall_timeout(5)
}

fn document_handler(store: &MemoryStore) -> Arc<dyn JobHandler> {
    let index: Arc<dyn docflow_core::VectorIndex> = Arc::new(MemoryVectorIndex::new(64));
    let processor = DocumentProcessor::new(
        Arc::new(ExtractionRegistry::with_defaults(false)),
        Arc::new(EmbeddingChain::new(64)),
        Arc::new(Summarizer::new(None)),
        Arc::new(Classifier::new(None)),
        Some(index),
    );
    Arc::new(DocumentJobHandler::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(processor),
    ))
}

/// Poll until the condition holds or the deadline expires.
macro_rules! wait_until {
    ($timeout:expr, $body:expr) => {{
        let deadline = tokio::time::Instant::now() + $timeout;
        loop {
            if $body {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("condition not met within {:?}", $timeout);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }};
}

#[tokio::test]
async fn plaintext_document_completes_end_to_end() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    let doc = Document::new("text/plain", 0);
    store.save(doc.clone()).await.unwrap();

    scheduler
        .process(QueueName::DocumentProcessing, 2, document_handler(&store))
        .await
        .unwrap();

    let job_id = scheduler
        .enqueue(
            QueueName::DocumentProcessing,
            Some(doc.id),
            Some(json!({
                "media_type": "text/plain",
                "data": "Page one of the report.\nPage two with more detail.",
                "flags": StageFlags::all(),
            })),
            5,
            Duration::ZERO,
        )
        .await
        .unwrap();

    let store2 = store.clone();
    wait_until!(Duration::from_secs(5), {
        store2.get(job_id).await.unwrap().unwrap().status == JobStatus::Completed
    });

    let report = scheduler.status(job_id).await.unwrap();
    assert_eq!(report.state, JobStatus::Completed);
    assert_eq!(report.progress, 100);
    assert_eq!(report.attempts_made, 1);
    assert!(report.error.is_none());

    let processed = store.load(doc.id).await.unwrap();
    assert_eq!(processed.status, DocumentStatus::Completed);
    assert!(!processed.extracted_text.as_deref().unwrap().is_empty());
    assert!(!processed.summary.as_deref().unwrap().is_empty());
    assert!(docflow_core::DocumentLabel::ALL.contains(&processed.classification.unwrap()));
    assert_eq!(processed.embedding.as_ref().unwrap().dimension, 64);

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn unsupported_type_fails_without_derived_fields() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    let doc = Document::new("application/octet-stream", 4);
    store.save(doc.clone()).await.unwrap();

    scheduler
        .process(QueueName::DocumentProcessing, 1, document_handler(&store))
        .await
        .unwrap();

    let job_id = scheduler
        .enqueue(
            QueueName::DocumentProcessing,
            Some(doc.id),
            Some(json!({
                "media_type": "application/octet-stream",
                "data": "\u{0}binary",
                "flags": StageFlags::all(),
            })),
            5,
            Duration::ZERO,
        )
        .await
        .unwrap();

    let store2 = store.clone();
    wait_until!(Duration::from_secs(5), {
        store2.get(job_id).await.unwrap().unwrap().status == JobStatus::Failed
    });

    let report = scheduler.status(job_id).await.unwrap();
    assert!(report.error.unwrap().contains("Unsupported media type"));

    let failed = store.load(doc.id).await.unwrap();
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert!(failed.embedding.is_none());
    assert!(failed.summary.is_none());

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}

/// Handler that always asks for a retry.
struct AlwaysRetryHandler;

#[async_trait]
impl JobHandler for AlwaysRetryHandler {
    fn queue(&self) -> QueueName {
        QueueName::Webhook
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Retry("endpoint unreachable".to_string())
    }
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    scheduler
        .process(QueueName::Webhook, 1, Arc::new(AlwaysRetryHandler))
        .await
        .unwrap();

    let job_id = scheduler
        .enqueue(QueueName::Webhook, None, None, 5, Duration::ZERO)
        .await
        .unwrap();

    let store2 = store.clone();
    wait_until!(Duration::from_secs(15), {
        store2.get(job_id).await.unwrap().unwrap().status == JobStatus::Failed
    });

    let job = store.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.attempts, job.max_attempts);
    assert!(job.error_message.unwrap().contains("endpoint unreachable"));

    // Permanently failed: never picked up again.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let job = store.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, job.max_attempts);

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}

/// Handler that tracks how many executions run concurrently per document.
struct GaugeHandler {
    active: Arc<Mutex<std::collections::HashMap<Uuid, usize>>>,
    max_seen: Arc<AtomicUsize>,
}

#[async_trait]
impl JobHandler for GaugeHandler {
    fn queue(&self) -> QueueName {
        QueueName::DocumentProcessing
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let document_id = ctx.document_id().unwrap();
        {
            let mut active = self.active.lock().unwrap();
            let counter = active.entry(document_id).or_insert(0);
            *counter += 1;
            self.max_seen.fetch_max(*counter, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let mut active = self.active.lock().unwrap();
            *active.get_mut(&document_id).unwrap() -= 1;
        }
        JobResult::Success(None)
    }
}

#[tokio::test]
async fn per_document_processing_is_serialized() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    let max_seen = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(GaugeHandler {
        active: Arc::new(Mutex::new(std::collections::HashMap::new())),
        max_seen: max_seen.clone(),
    });

    scheduler
        .process(QueueName::DocumentProcessing, 4, handler)
        .await
        .unwrap();

    // Many jobs for one document, enqueued concurrently.
    let document_id = Uuid::new_v4();
    let mut job_ids = Vec::new();
    for _ in 0..6 {
        job_ids.push(
            scheduler
                .enqueue(
                    QueueName::DocumentProcessing,
                    Some(document_id),
                    None,
                    5,
                    Duration::ZERO,
                )
                .await
                .unwrap(),
        );
    }

    let store2 = store.clone();
    let ids = job_ids.clone();
    wait_until!(Duration::from_secs(10), {
        let mut done = true;
        for id in &ids {
            done &= store2.get(*id).await.unwrap().unwrap().status == JobStatus::Completed;
        }
        done
    });

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn paused_queue_claims_nothing_until_resume() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    scheduler.pause(QueueName::Webhook).await;
    scheduler
        .process(QueueName::Webhook, 1, Arc::new(EchoHandler))
        .await
        .unwrap();

    let job_id = scheduler
        .enqueue(QueueName::Webhook, None, None, 5, Duration::ZERO)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        store.get(job_id).await.unwrap().unwrap().status,
        JobStatus::Queued
    );

    scheduler.resume(QueueName::Webhook).await;
    let store2 = store.clone();
    wait_until!(Duration::from_secs(5), {
        store2.get(job_id).await.unwrap().unwrap().status == JobStatus::Completed
    });

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}

/// Minimal success handler for the webhook queue.
struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    fn queue(&self) -> QueueName {
        QueueName::Webhook
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(100, None);
        JobResult::Success(ctx.payload().cloned())
    }
}

/// Handler that outlives the per-job timeout.
struct SleepyHandler;

#[async_trait]
impl JobHandler for SleepyHandler {
    fn queue(&self) -> QueueName {
        QueueName::Webhook
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        tokio::time::sleep(Duration::from_secs(60)).await;
        JobResult::Success(None)
    }
}

#[tokio::test]
async fn handler_timeout_follows_retry_policy() {
    let store = MemoryStore::new();
    let config = fast_config().with_job_timeout(1);
    let scheduler = Scheduler::new(Arc::new(store.clone()), config);

    scheduler
        .process(QueueName::Webhook, 1, Arc::new(SleepyHandler))
        .await
        .unwrap();

    // max_attempts = 1 so the first timeout exhausts the job.
    let mut job = Job::new(QueueName::Webhook, None, None, 5, Duration::ZERO).unwrap();
    job.max_attempts = 1;
    let job_id = job.id;
    store.create(job).await.unwrap();

    let store2 = store.clone();
    wait_until!(Duration::from_secs(10), {
        store2.get(job_id).await.unwrap().unwrap().status == JobStatus::Failed
    });

    let job = store.get(job_id).await.unwrap().unwrap();
    assert!(job.error_message.unwrap().contains("timeout"));

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn shutdown_rejects_new_work() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    scheduler.shutdown(Duration::from_millis(100)).await.unwrap();

    let result = scheduler
        .enqueue(QueueName::Webhook, None, None, 5, Duration::ZERO)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn cancel_removes_queued_job() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    // No workers running: the job stays queued.
    let job_id = scheduler
        .enqueue(QueueName::Webhook, None, None, 5, Duration::ZERO)
        .await
        .unwrap();

    assert!(scheduler.cancel(job_id).await.unwrap());
    assert!(store.get(job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn stats_reflect_lifecycle() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::new(Arc::new(store.clone()), fast_config());

    scheduler
        .enqueue(QueueName::Webhook, None, None, 5, Duration::ZERO)
        .await
        .unwrap();
    scheduler
        .enqueue(QueueName::Webhook, None, None, 5, Duration::from_secs(600))
        .await
        .unwrap();

    let stats = scheduler.stats(QueueName::Webhook).await.unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.delayed, 1);

    scheduler
        .process(QueueName::Webhook, 1, Arc::new(EchoHandler))
        .await
        .unwrap();
    let store2 = store.clone();
    wait_until!(Duration::from_secs(5), {
        store2.stats(QueueName::Webhook).await.unwrap().completed == 1
    });

    // Cleanup removes the completed job, leaves the delayed one.
    let removed = scheduler.cleanup_older_than(Duration::ZERO).await.unwrap();
    assert_eq!(removed, 1);
    let stats = scheduler.stats(QueueName::Webhook).await.unwrap();
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.delayed, 1);

    scheduler.shutdown(Duration::from_secs(2)).await.unwrap();
}
