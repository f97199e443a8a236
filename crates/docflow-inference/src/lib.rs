//! # docflow-inference
//!
//! Inference backends for the docflow pipeline:
//!
//! - the embedding provider chain with ordered fallback
//!   ([`EmbeddingChain`]) over Ollama, OpenAI, and the deterministic hashed
//!   terminator;
//! - summarization with an extractive fallback ([`Summarizer`]);
//! - classification into the closed label set ([`Classifier`]);
//! - a deterministic [`MockBackend`] for tests.

pub mod chain;
pub mod classify;
pub mod hashed;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod summarize;

pub use chain::{ChainedEmbedding, EmbeddingChain};
pub use classify::Classifier;
pub use hashed::HashedEmbedder;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiEmbedder;
pub use summarize::Summarizer;
