//! Deterministic hashed bag-of-words embedder.
//!
//! The terminator of every embedding chain: no network, no model, no failure
//! mode for non-empty input. Each whitespace-separated token is hashed with
//! SHA-256 into a bucket of the output vector, and the result is normalized
//! to unit length. Identical text always produces an identical vector.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use docflow_core::{EmbeddingBackend, Error, Result};

/// Deterministic local embedder with a fixed dimension.
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Bucket index for a token: first eight bytes of its SHA-256 digest,
    /// reduced modulo the dimension.
    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.to_lowercase().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(bytes) % self.dimension as u64) as usize
    }

    fn normalize(vector: &mut [f32]) {
        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vector.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

#[async_trait]
impl EmbeddingBackend for HashedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in text.split_whitespace() {
            vector[self.bucket(token)] += 1.0;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(Error::InvalidInput(
                "Cannot embed empty text".to_string(),
            ));
        }

        Self::normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashed"
    }
}
