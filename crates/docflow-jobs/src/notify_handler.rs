//! Handler for the notification queue.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use docflow_core::{Notifier, QueueName};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Delivers processed/failed notifications through the [`Notifier`]
/// collaborator.
///
/// Fire-and-forget: delivery problems are logged by the notifier and never
/// fail the job, so a broken mail relay cannot clog the queue.
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl JobHandler for NotificationHandler {
    fn queue(&self) -> QueueName {
        QueueName::Notification
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(payload) = ctx.payload() else {
            return JobResult::Failed("Missing notification payload".to_string());
        };

        let Some(recipient) = payload.get("recipient").and_then(|v| v.as_str()) else {
            return JobResult::Failed("Notification without recipient".to_string());
        };
        let document_id = payload
            .get("document_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Uuid>().ok());
        let status = payload.get("status").and_then(|v| v.as_str()).unwrap_or("");

        ctx.report_progress(50, Some("Delivering notification"));

        if status == "failed" {
            let error = payload
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            match document_id {
                Some(id) => self.notifier.notify_failed(recipient, id, error).await,
                None => warn!(recipient, "Failure notification without document_id"),
            }
        } else {
            let summary = payload
                .get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or("(no summary)");
            self.notifier.notify_processed(recipient, summary).await;
        }

        ctx.report_progress(100, Some("Delivered"));
        JobResult::Success(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use docflow_core::{Job, QueueName};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingNotifier {
        processed: Mutex<Vec<(String, String)>>,
        failed: Mutex<Vec<(String, Uuid, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_processed(&self, recipient: &str, document_summary: &str) {
            self.processed
                .lock()
                .unwrap()
                .push((recipient.to_string(), document_summary.to_string()));
        }

        async fn notify_failed(&self, recipient: &str, document_id: Uuid, error: &str) {
            self.failed.lock().unwrap().push((
                recipient.to_string(),
                document_id,
                error.to_string(),
            ));
        }
    }

    fn ctx_with(payload: serde_json::Value) -> JobContext {
        let job = Job::new(
            QueueName::Notification,
            None,
            Some(payload),
            5,
            Duration::ZERO,
        )
        .unwrap();
        JobContext::new(job)
    }

    #[tokio::test]
    async fn test_processed_notification() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = NotificationHandler::new(notifier.clone());

        let result = handler
            .execute(ctx_with(json!({
                "recipient": "ops@example.com",
                "status": "completed",
                "summary": "All done.",
            })))
            .await;

        assert!(matches!(result, JobResult::Success(None)));
        let processed = notifier.processed.lock().unwrap();
        assert_eq!(
            processed[0],
            ("ops@example.com".to_string(), "All done.".to_string())
        );
    }

    #[tokio::test]
    async fn test_failed_notification() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = NotificationHandler::new(notifier.clone());
        let document_id = Uuid::new_v4();

        let result = handler
            .execute(ctx_with(json!({
                "recipient": "ops@example.com",
                "document_id": document_id,
                "status": "failed",
                "error": "extraction exploded",
            })))
            .await;

        assert!(matches!(result, JobResult::Success(None)));
        let failed = notifier.failed.lock().unwrap();
        assert_eq!(failed[0].1, document_id);
        assert_eq!(failed[0].2, "extraction exploded");
    }

    #[tokio::test]
    async fn test_missing_recipient_fails() {
        let handler = NotificationHandler::new(Arc::new(RecordingNotifier::default()));
        let result = handler
            .execute(ctx_with(json!({"status": "completed"})))
            .await;
        assert!(matches!(result, JobResult::Failed(_)));
    }
}
