//! Mock inference backend for deterministic testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docflow_core::{EmbeddingBackend, Error, GenerationBackend, Result};

/// Deterministic mock backend implementing both inference traits.
///
/// Embeddings are derived from character codes (same text → same vector) and
/// normalized to unit length. Generation returns a fixed response or a
/// per-prompt mapping. A `failing` mock errors on every call, for exercising
/// fallback and retry paths.
#[derive(Clone)]
pub struct MockBackend {
    dimension: usize,
    name: String,
    fail: bool,
    max_input_chars: Option<usize>,
    default_response: String,
    responses: HashMap<String, String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            name: "mock".to_string(),
            fail: false,
            max_input_chars: None,
            default_response: "Mock response".to_string(),
            responses: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_max_input_chars(mut self, limit: usize) -> Self {
        self.max_input_chars = Some(limit);
        self
    }

    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn with_response_mapping(
        mut self,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.responses.insert(prompt.into(), response.into());
        self
    }

    /// Number of embed calls made against this mock.
    pub fn embed_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The most recent embed input, if any.
    pub fn last_input(&self) -> Option<String> {
        self.calls.lock().unwrap().last().cloned()
    }

    /// Deterministic embedding from character codes, unit-normalized.
    pub fn generate_vector(text: &str, dimension: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dimension];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vector[idx] += 0.1;
        }
        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vector.iter_mut().for_each(|x| *x /= magnitude);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::EmbeddingProvider(format!(
                "Mock backend '{}' configured to fail",
                self.name
            )));
        }
        Ok(Self::generate_vector(text, self.dimension))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_input_chars
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.fail {
            return Err(Error::Inference(format!(
                "Mock backend '{}' configured to fail",
                self.name
            )));
        }
        Ok(self
            .responses
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone()))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
