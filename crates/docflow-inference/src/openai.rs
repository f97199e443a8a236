//! OpenAI-compatible embedding backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docflow_core::{defaults, EmbeddingBackend, Error, Result};

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI embedding model.
pub const DEFAULT_OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

/// Embedding backend for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(base_url: String, api_key: String, model: String, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
            dimension,
            timeout_secs: defaults::EMBED_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables. Returns `None` unless
    /// `OPENAI_API_KEY` is set and non-empty.
    pub fn from_env(dimension: usize) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let model = std::env::var("OPENAI_EMBED_MODEL")
            .unwrap_or_else(|_| DEFAULT_OPENAI_EMBED_MODEL.to_string());
        Some(Self::new(base_url, api_key, model, dimension))
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: self.model.clone(),
            input: text.to_string(),
            dimensions: self.dimension,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingProvider(format!(
                "OpenAI returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("Failed to parse response: {}", e)))?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::EmbeddingProvider("OpenAI returned no embedding".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "openai"
    }

    /// Conservative character budget for the 8k-token embedding context.
    fn max_input_chars(&self) -> Option<usize> {
        Some(defaults::OPENAI_EMBED_MAX_CHARS)
    }
}
