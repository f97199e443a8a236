//! Ollama inference backend (embedding + generation).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docflow_core::{defaults, EmbeddingBackend, Error, GenerationBackend, Result};

/// Ollama backend over the local HTTP API.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    gen_model: String,
    dimension: usize,
    embed_timeout_secs: u64,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a backend with explicit configuration.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        gen_model: String,
        dimension: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url,
            embed_model,
            gen_model,
            dimension,
            embed_timeout_secs: defaults::EMBED_TIMEOUT_SECS,
            gen_timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables (`OLLAMA_URL`, `EMBED_MODEL`,
    /// `GEN_MODEL`, `EMBED_DIMENSION`), with defaults for anything unset.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| defaults::OLLAMA_URL.to_string());
        let embed_model =
            std::env::var("EMBED_MODEL").unwrap_or_else(|_| defaults::EMBED_MODEL.to_string());
        let gen_model =
            std::env::var("GEN_MODEL").unwrap_or_else(|_| defaults::GEN_MODEL.to_string());
        let dimension = std::env::var("EMBED_DIMENSION")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::EMBED_DIMENSION);
        Self::with_config(base_url, embed_model, gen_model, dimension)
    }

    /// Probe the Ollama server.
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                warn!(error = %e, "Ollama health check error");
                Ok(false)
            }
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingProvider(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingProvider(format!("Failed to parse response: {}", e)))?;

        let vector = result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingProvider("Ollama returned no embedding".to_string()))?;

        debug!(
            model = %self.embed_model,
            dimension = vector.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Embedding complete"
        );
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "ollama"
    }

    /// Ollama input is truncated to the model context window; the limit here
    /// is conservative for nomic-embed-text's 8k-token context.
    fn max_input_chars(&self) -> Option<usize> {
        Some(defaults::OLLAMA_EMBED_MAX_CHARS)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.gen_model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(self.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        Ok(result.response.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}
