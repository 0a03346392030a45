//! Provider abstractions for embedding generation
//!
//! The embedding model is an external collaborator consumed behind a trait,
//! so backends can be swapped without touching the pipelines.

pub mod embedding;
pub mod hashing;
pub mod ollama;

pub use embedding::{embed_with_retry, EmbeddingProvider};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;
