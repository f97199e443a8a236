//! Webhook delivery and the webhook queue handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use docflow_core::{defaults, DeliveryReceipt, Error, QueueName, Result, WebhookDeliverer};

use crate::handler::{JobContext, JobHandler, JobResult};

/// HTTP webhook deliverer with a bounded request timeout.
pub struct HttpWebhookDeliverer {
    client: Client,
    timeout: Duration,
}

impl HttpWebhookDeliverer {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(defaults::WEBHOOK_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpWebhookDeliverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookDeliverer for HttpWebhookDeliverer {
    async fn deliver(
        &self,
        url: &str,
        payload: &JsonValue,
        headers: &HashMap<String, String>,
    ) -> Result<DeliveryReceipt> {
        let mut request = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("Webhook delivery to {} failed: {}", url, e)))?;

        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(url, status_code, "Webhook delivered");
        Ok(DeliveryReceipt { status_code, body })
    }
}

/// Handler for the webhook queue.
///
/// Non-2xx responses and transport errors are transient: the job is retried
/// with the same backoff policy as every other queue.
pub struct WebhookHandler {
    deliverer: Arc<dyn WebhookDeliverer>,
}

impl WebhookHandler {
    pub fn new(deliverer: Arc<dyn WebhookDeliverer>) -> Self {
        Self { deliverer }
    }
}

#[async_trait]
impl JobHandler for WebhookHandler {
    fn queue(&self) -> QueueName {
        QueueName::Webhook
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let Some(payload) = ctx.payload() else {
            return JobResult::Failed("Missing webhook payload".to_string());
        };
        let Some(url) = payload.get("url").and_then(|v| v.as_str()) else {
            return JobResult::Failed("Webhook job without url".to_string());
        };
        let body = payload.get("payload").cloned().unwrap_or(JsonValue::Null);
        let headers: HashMap<String, String> = payload
            .get("headers")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        ctx.report_progress(30, Some("Delivering webhook"));

        match self.deliverer.deliver(url, &body, &headers).await {
            Ok(receipt) if receipt.is_success() => {
                ctx.report_progress(100, Some("Delivered"));
                JobResult::Success(Some(json!({
                    "status_code": receipt.status_code,
                })))
            }
            Ok(receipt) => {
                warn!(url, status_code = receipt.status_code, "Webhook endpoint rejected delivery");
                JobResult::Retry(format!(
                    "Webhook endpoint returned {}",
                    receipt.status_code
                ))
            }
            Err(e) => JobResult::Retry(e.to_string()),
        }
    }
}
