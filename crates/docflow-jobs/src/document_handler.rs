//! Handler for the document-processing queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use docflow_core::{
    defaults, DocumentRepository, DocumentStatus, Job, JobRepository, QueueName, StageFlags,
};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::processor::DocumentProcessor;

/// Runs the document pipeline for each claimed job and persists the outcome.
///
/// Payload shape:
/// ```json
/// {
///   "media_type": "text/plain",
///   "path": "/uploads/report.txt",     // or "data": "<inline text>"
///   "flags": { "extract_text": true, ... },
///   "notify": "ops@example.com"        // optional
/// }
/// ```
pub struct DocumentJobHandler {
    docs: Arc<dyn DocumentRepository>,
    jobs: Arc<dyn JobRepository>,
    processor: Arc<DocumentProcessor>,
}

impl DocumentJobHandler {
    pub fn new(
        docs: Arc<dyn DocumentRepository>,
        jobs: Arc<dyn JobRepository>,
        processor: Arc<DocumentProcessor>,
    ) -> Self {
        Self {
            docs,
            jobs,
            processor,
        }
    }

    /// Queue a notification job for the document's recipient.
    async fn enqueue_notification(
        &self,
        recipient: &str,
        document_id: uuid::Uuid,
        status: DocumentStatus,
        summary: Option<&str>,
        error: Option<&str>,
    ) {
        let payload = json!({
            "recipient": recipient,
            "document_id": document_id,
            "status": status,
            "summary": summary,
            "error": error,
        });
        let job = match Job::new(
            QueueName::Notification,
            Some(document_id),
            Some(payload),
            defaults::PRIORITY_DEFAULT,
            Duration::ZERO,
        ) {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to build notification job");
                return;
            }
        };
        // Notification is fire-and-forget; a queue error never fails the
        // document job.
        if let Err(e) = self.jobs.create(job).await {
            warn!(error = %e, "Failed to enqueue notification job");
        }
    }
}

#[async_trait]
impl JobHandler for DocumentJobHandler {
    fn queue(&self) -> QueueName {
        QueueName::DocumentProcessing
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(document_id) = ctx.document_id() else {
            return JobResult::Failed("Document-processing job without document_id".to_string());
        };
        let Some(payload) = ctx.payload().cloned() else {
            return JobResult::Failed("Missing document-processing payload".to_string());
        };

        let media_type = payload
            .get("media_type")
            .and_then(|v| v.as_str())
            .unwrap_or("application/octet-stream")
            .to_string();
        let flags = payload
            .get("flags")
            .and_then(|v| serde_json::from_value::<StageFlags>(v.clone()).ok())
            .unwrap_or_default();
        let recipient = payload
            .get("notify")
            .and_then(|v| v.as_str())
            .map(String::from);

        // Inline data for small/test payloads, a file path otherwise.
        let data: Vec<u8> = if let Some(inline) = payload.get("data").and_then(|v| v.as_str()) {
            inline.as_bytes().to_vec()
        } else if let Some(path) = payload.get("path").and_then(|v| v.as_str()) {
            match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                // Reads can fail transiently (network mounts); retry.
                Err(e) => return JobResult::Retry(format!("Failed to read {}: {}", path, e)),
            }
        } else {
            return JobResult::Failed(
                "No input provided (expected 'data' or 'path' field)".to_string(),
            );
        };

        let mut document = match self.docs.load(document_id).await {
            Ok(doc) => doc,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        document.status = DocumentStatus::Processing;
        if let Err(e) = self.docs.save(document.clone()).await {
            return JobResult::Retry(format!("Failed to persist document: {}", e));
        }

        ctx.report_progress(5, Some("Starting pipeline"));
        let outcome = self
            .processor
            .process(
                document_id,
                &data,
                &media_type,
                flags,
                ctx.cancel_flag(),
                |percent, message| ctx.report_progress(percent, message),
            )
            .await;

        // A retryable stage error leaves the document in Processing and asks
        // the queue for another attempt.
        if let Some(stage_error) = outcome.retryable_error() {
            return JobResult::Retry(format!(
                "Stage {} failed: {}",
                stage_error.stage, stage_error.error
            ));
        }

        document.extracted_text = outcome.extracted_text.clone();
        if outcome.metadata.is_some() {
            document.metadata = outcome.metadata.clone().unwrap_or_default();
        }
        document.embedding = outcome.embedding.clone();
        document.summary = outcome.summary.clone();
        document.classification = outcome.classification;
        document.status = outcome.status;
        document.processed_at = Some(Utc::now());

        if let Err(e) = self.docs.save(document.clone()).await {
            return JobResult::Retry(format!("Failed to persist document: {}", e));
        }

        let stage_errors: Vec<String> = outcome
            .stage_errors
            .iter()
            .map(|e| format!("{}: {}", e.stage, e.error))
            .collect();

        if let Some(recipient) = recipient.as_deref() {
            self.enqueue_notification(
                recipient,
                document_id,
                outcome.status,
                document.summary.as_deref(),
                stage_errors.first().map(String::as_str),
            )
            .await;
        }

        match outcome.status {
            DocumentStatus::Failed => JobResult::Failed(
                stage_errors
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "Document processing failed".to_string()),
            ),
            _ => JobResult::Success(Some(json!({
                "document_id": document_id,
                "status": outcome.status,
                "text_length": document.extracted_text.as_ref().map(|t| t.len()).unwrap_or(0),
                "has_embedding": document.embedding.is_some(),
                "has_summary": document.summary.is_some(),
                "classification": document.classification,
                "stage_errors": stage_errors,
                "cancelled": outcome.cancelled,
            }))),
        }
    }
}
