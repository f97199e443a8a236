//! Ordered embedding provider chain with automatic fallback.

use std::sync::Arc;
use std::time::Instant;

use docflow_core::{defaults, EmbeddingBackend, Error, Result};
use tracing::{debug, warn};

/// A successful chain embedding: the vector plus the backend that produced it.
#[derive(Debug, Clone)]
pub struct ChainedEmbedding {
    pub vector: Vec<f32>,
    pub provider: String,
}

/// Ordered list of embedding backends sharing one fixed dimension.
///
/// `embed` tries each backend in order and falls through on any error
/// (transient, auth, quota; the chain does not distinguish). The final
/// backend is always the deterministic [`HashedEmbedder`], so the chain
/// terminates successfully for any non-empty input even with no remote
/// provider configured.
///
/// [`HashedEmbedder`]: crate::hashed::HashedEmbedder
pub struct EmbeddingChain {
    backends: Vec<Arc<dyn EmbeddingBackend>>,
    dimension: usize,
}

impl EmbeddingChain {
    /// Create a chain holding only the hashed terminator.
    pub fn new(dimension: usize) -> Self {
        Self {
            backends: vec![Arc::new(crate::hashed::HashedEmbedder::new(dimension))],
            dimension,
        }
    }

    /// Build from environment: Ollama first when `OLLAMA_URL` is set, then
    /// OpenAI when `OPENAI_API_KEY` is set, then the hashed terminator.
    pub fn from_env() -> Result<Self> {
        let dimension = std::env::var("EMBED_DIMENSION")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::EMBED_DIMENSION);

        let mut chain = Self::new(dimension);
        if std::env::var("OLLAMA_URL").is_ok() {
            chain.push(Arc::new(crate::ollama::OllamaBackend::from_env()))?;
        }
        if let Some(openai) = crate::openai::OpenAiEmbedder::from_env(dimension) {
            chain.push(Arc::new(openai))?;
        }
        Ok(chain)
    }

    /// Insert a backend ahead of the terminator, after all previously pushed
    /// backends. Rejects backends whose dimension differs from the chain's.
    pub fn push(&mut self, backend: Arc<dyn EmbeddingBackend>) -> Result<()> {
        if backend.dimension() != self.dimension {
            return Err(Error::Config(format!(
                "Backend '{}' has dimension {}, chain requires {}",
                backend.name(),
                backend.dimension(),
                self.dimension
            )));
        }
        let terminator = self.backends.len() - 1;
        self.backends.insert(terminator, backend);
        Ok(())
    }

    /// The fixed dimension every vector from this chain has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Backend names in fallback order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Truncate to a backend's input limit at a char boundary.
    fn truncate_for<'a>(backend: &dyn EmbeddingBackend, text: &'a str) -> &'a str {
        match backend.max_input_chars() {
            Some(limit) if text.chars().count() > limit => {
                let end = text
                    .char_indices()
                    .nth(limit)
                    .map(|(i, _)| i)
                    .unwrap_or(text.len());
                &text[..end]
            }
            _ => text,
        }
    }

    /// Embed text, falling through failed backends in order.
    pub async fn embed(&self, text: &str) -> Result<ChainedEmbedding> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }

        let mut last_error = None;
        for backend in &self.backends {
            let input = Self::truncate_for(backend.as_ref(), text);
            let start = Instant::now();
            match backend.embed(input).await {
                Ok(vector) => {
                    if vector.len() != self.dimension {
                        // A backend lying about its dimension is a fallthrough,
                        // not a hard failure.
                        warn!(
                            backend = backend.name(),
                            got = vector.len(),
                            expected = self.dimension,
                            "Backend returned wrong dimension"
                        );
                        last_error = Some(Error::EmbeddingProvider(format!(
                            "Backend '{}' returned dimension {}",
                            backend.name(),
                            vector.len()
                        )));
                        continue;
                    }
                    debug!(
                        backend = backend.name(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Embedding generated"
                    );
                    return Ok(ChainedEmbedding {
                        vector,
                        provider: backend.name().to_string(),
                    });
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Embedding backend failed, falling through");
                    last_error = Some(e);
                }
            }
        }

        // Only reachable if the terminator itself failed (empty-token input).
        Err(Error::EmbeddingProvider(format!(
            "All embedding backends exhausted: {}",
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no backends configured".to_string())
        )))
    }
}
