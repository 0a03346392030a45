//! Retrieval pipeline: embed the query, search the index, rank chunks
//!
//! Read-only. Searches run against the last fully-committed index state
//! and never wait on the per-document ingestion locks.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::{embed_with_retry, EmbeddingProvider};
use crate::storage::VectorIndex;
use crate::types::{QueryRequest, RetrievalResult, RetrievedChunk};

/// Retrieval pipeline
pub struct RetrievalPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_timeout: Duration,
    retry_backoff: Duration,
}

impl RetrievalPipeline {
    /// Create a new retrieval pipeline
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        embed_timeout: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            embed_timeout,
            retry_backoff,
        }
    }

    /// Retrieve the top-k chunks for a query, ordered by ascending distance
    ///
    /// An empty index yields an empty result, which is a valid non-error
    /// state distinct from a failed search.
    pub async fn retrieve(&self, request: QueryRequest) -> Result<RetrievalResult> {
        let texts = vec![request.question.clone()];
        let mut embeddings = embed_with_retry(
            self.embedder.as_ref(),
            &texts,
            self.embed_timeout,
            self.retry_backoff,
        )
        .await?;

        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| Error::provider("provider returned no query embedding"))?;

        let index = Arc::clone(&self.index);
        let k = request.top_k;
        let hits = tokio::task::spawn_blocking(move || index.search(&query_embedding, k))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        let chunks = hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                chunk_id: hit.chunk_id,
                document_id: hit.document_id,
                content: hit.content,
                distance: hit.distance,
            })
            .collect();

        Ok(RetrievalResult {
            chunks,
            session_id: request.session_id,
        })
    }
}
