//! Collaborator traits for the docflow pipeline.
//!
//! These traits define the seams between the pipeline and the infrastructure
//! around it: persistence, notification, webhook delivery, inference
//! backends, extractors, and the vector index. Concrete implementations are
//! pluggable, which keeps every component testable in isolation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Durable storage of document records.
///
/// Each call is transactional on its own; no cross-call transactions are
/// assumed. Deleting a document cascades to its embedding record.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Load a document by id.
    async fn load(&self, id: Uuid) -> Result<Document>;

    /// Insert or update a document record.
    async fn save(&self, doc: Document) -> Result<()>;

    /// Delete a document and its embedding.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Count documents grouped by status.
    async fn counts_by_status(&self) -> Result<HashMap<DocumentStatus, i64>>;
}

/// Durable storage and claiming of queue jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a new job and mark it Queued.
    async fn create(&self, job: Job) -> Result<Uuid>;

    /// Claim the next dispatchable job on a queue.
    ///
    /// Dispatch order is ascending priority, FIFO within a priority. Jobs
    /// still inside their visibility delay are skipped, as is any
    /// document-processing job whose document already has one in progress.
    async fn claim_next(&self, queue: QueueName) -> Result<Option<Job>>;

    /// Record handler progress (clamped to 0–100).
    async fn update_progress(&self, job_id: Uuid, percent: i32, message: Option<&str>)
        -> Result<()>;

    /// Mark a job Completed with an optional result payload.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark a job permanently Failed.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Re-queue a failed attempt with a backoff delay.
    ///
    /// Returns `false` (and fails the job) when attempts are exhausted.
    async fn retry(&self, job_id: Uuid, error: &str, delay: Duration) -> Result<bool>;

    /// Re-queue in-progress jobs whose last progress report is older than
    /// `stall_timeout`. Each job is recovered at most once; a second stall
    /// fails it. Returns the ids of re-queued jobs.
    async fn requeue_stalled(&self, stall_timeout: Duration) -> Result<Vec<Uuid>>;

    /// Remove a job that has not started yet. In-progress jobs cannot be
    /// preempted.
    async fn cancel_pending(&self, job_id: Uuid) -> Result<bool>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Per-queue statistics.
    async fn stats(&self, queue: QueueName) -> Result<QueueStats>;

    /// Delete terminal jobs older than `age`; returns the count removed.
    async fn cleanup_older_than(&self, age: Duration) -> Result<usize>;
}

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Outbound notification collaborator.
///
/// Fire-and-forget: implementations log failures but never propagate them
/// into the pipeline.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify a recipient that their document finished processing.
    async fn notify_processed(&self, recipient: &str, document_summary: &str);

    /// Notify a recipient that processing failed.
    async fn notify_failed(&self, recipient: &str, document_id: Uuid, error: &str);
}

/// Notifier that writes to the structured log. The in-tree default.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_processed(&self, recipient: &str, document_summary: &str) {
        tracing::info!(
            recipient,
            summary_len = document_summary.len(),
            "Document processed notification"
        );
    }

    async fn notify_failed(&self, recipient: &str, document_id: Uuid, error: &str) {
        tracing::warn!(recipient, %document_id, error, "Document failed notification");
    }
}

// =============================================================================
// WEBHOOK DELIVERY
// =============================================================================

/// Outcome of a single webhook delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub status_code: u16,
    pub body: String,
}

impl DeliveryReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Delivers webhook payloads to external endpoints.
#[async_trait]
pub trait WebhookDeliverer: Send + Sync {
    async fn deliver(
        &self,
        url: &str,
        payload: &JsonValue,
        headers: &HashMap<String, String>,
    ) -> Result<DeliveryReceipt>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate an embedding for the given text.
    ///
    /// Callers truncate input to [`EmbeddingBackend::max_input_chars`] before
    /// submission; implementations may assume input fits.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The fixed dimension of vectors this backend produces.
    fn dimension(&self) -> usize;

    /// Backend name, recorded on the embedding record.
    fn name(&self) -> &str;

    /// Maximum input length in characters; longer input is truncated at a
    /// char boundary before submission. `None` means unbounded.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }
}

/// Backend for text generation (summaries, classification prompts).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Result of content extraction from uploaded bytes.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Extraction {
    /// Extracted plain text, if the format carries text.
    pub text: Option<String>,
    /// Structural metadata (page count, pixel dimensions, char/line counts).
    pub metadata: JsonValue,
}

/// Extracts plain text from one family of media types.
///
/// Extractors are pure with respect to their input: the source bytes are
/// never mutated, and identical bytes yield identical text. Implementations
/// that need an on-disk artifact (OCR preprocessing) write to a derived
/// temporary file.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract text and metadata from raw bytes.
    async fn extract(&self, data: &[u8], media_type: &str) -> Result<Extraction>;

    /// Check that the extractor's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}

// =============================================================================
// VECTOR INDEX
// =============================================================================

/// One entry to upsert into the index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub metadata: JsonValue,
    /// Short text snippet stored alongside the vector.
    pub snippet: String,
}

/// A ranked query hit. `score` is similarity (1 − distance).
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: Uuid,
    pub score: f32,
    pub metadata: JsonValue,
    pub snippet: String,
}

/// Thin client over a vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace one entry. Rejects dimension mismatches.
    async fn upsert(&self, entry: IndexEntry) -> Result<()>;

    /// Insert or replace a batch of entries.
    async fn batch_upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Rank candidates by similarity, descending. `filter` restricts
    /// candidates to entries whose metadata contains every filter key with an
    /// equal value; hits scoring below `threshold` are excluded.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&JsonValue>,
        threshold: f32,
    ) -> Result<Vec<QueryHit>>;

    /// Remove one entry. Removing a missing id is a no-op.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_receipt_success_range() {
        assert!(DeliveryReceipt {
            status_code: 200,
            body: String::new()
        }
        .is_success());
        assert!(DeliveryReceipt {
            status_code: 204,
            body: String::new()
        }
        .is_success());
        assert!(!DeliveryReceipt {
            status_code: 301,
            body: String::new()
        }
        .is_success());
        assert!(!DeliveryReceipt {
            status_code: 500,
            body: String::new()
        }
        .is_success());
    }

    #[tokio::test]
    async fn test_log_notifier_is_fire_and_forget() {
        // Must never panic or block regardless of input.
        let notifier = LogNotifier;
        notifier.notify_processed("ops@example.com", "summary").await;
        notifier
            .notify_failed("ops@example.com", Uuid::new_v4(), "boom")
            .await;
    }

    #[test]
    fn test_extraction_default_has_no_text() {
        let extraction = Extraction::default();
        assert!(extraction.text.is_none());
        assert!(extraction.metadata.is_null());
    }
}
