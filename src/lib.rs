//! Document indexing and retrieval engine for grounded question answering.
//!
//! Documents are loaded, chunked, embedded, and stored in a durable vector
//! index alongside a document registry that tracks lifecycle state. Queries
//! are embedded with the same provider and answered from the last
//! fully-committed index state.
//!
//! ```no_run
//! use std::sync::Arc;
//! use docrag::{FormatLoader, HashingEmbedder, QueryRequest, RagConfig, RagEngine};
//!
//! # async fn run() -> docrag::Result<()> {
//! let config = RagConfig::default();
//! let embedder = Arc::new(HashingEmbedder::new(config.embedding.dimensions));
//! let engine = RagEngine::open(config, embedder, Arc::new(FormatLoader::new()))?;
//!
//! engine.ingest(b"Lima is the capital of Peru.".to_vec(), "peru.txt").await?;
//! let result = engine.retrieve(QueryRequest::new("capital of Peru")).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use engine::RagEngine;
pub use error::{Error, Result};
pub use generation::PromptBuilder;
pub use ingestion::{DocumentLoader, FormatLoader, IngestionPipeline, TextChunker};
pub use providers::{EmbeddingProvider, HashingEmbedder, OllamaEmbedder};
pub use retrieval::RetrievalPipeline;
pub use storage::{DocumentRegistry, VectorIndex};
pub use types::{
    Chunk, Document, DocumentFormat, DocumentStatus, QueryRequest, RetrievalResult, RetrievedChunk,
};
