//! Query request and retrieval result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question or query text
    pub question: String,

    /// Number of chunks to retrieve (default: 4)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Opaque session identifier, threaded through unchanged
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_top_k() -> usize {
    4
}

impl QueryRequest {
    /// Create a request with the default top_k and no session
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: default_top_k(),
            session_id: None,
        }
    }

    /// Override the number of chunks to retrieve
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Attach a session identifier
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// A retrieved chunk with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk id
    pub chunk_id: String,
    /// Owning document id
    pub document_id: Uuid,
    /// Chunk text
    pub content: String,
    /// Distance to the query embedding (lower is closer)
    pub distance: f32,
}

/// Result of a retrieval, ordered by ascending distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Ranked chunks; empty when the index holds nothing relevant
    pub chunks: Vec<RetrievedChunk>,
    /// Session identifier echoed from the request
    pub session_id: Option<String>,
}
