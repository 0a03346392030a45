//! Core types for the indexing and retrieval engine

pub mod document;
pub mod query;

pub use document::{Chunk, Document, DocumentFormat, DocumentStatus};
pub use query::{QueryRequest, RetrievalResult, RetrievedChunk};
