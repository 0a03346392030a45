//! Ingestion pipeline orchestration
//!
//! One document at a time: registry create → load → chunk → embed →
//! atomic index insert → registry commit. Callers observe either full
//! success (`indexed`, queryable) or full failure (`failed`, no chunks
//! indexed); the failure reason is recorded on the document.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::{embed_with_retry, EmbeddingProvider};
use crate::storage::{DocumentRegistry, IndexEntry, VectorIndex};
use crate::types::{Chunk, Document, DocumentFormat};

use super::chunker::TextChunker;
use super::loader::DocumentLoader;

/// Per-document mutual exclusion, keyed by document id
///
/// Ingest and delete of the same document serialize here; unrelated
/// documents proceed fully in parallel. Retrieval never touches these.
#[derive(Default)]
pub struct DocumentLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl DocumentLocks {
    /// Create an empty lock map
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a document id, creating it on first use
    pub async fn acquire(&self, document_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(document_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for a deleted document
    ///
    /// Waiters already holding the Arc are unaffected.
    pub fn remove(&self, document_id: &Uuid) {
        self.locks.remove(document_id);
    }
}

/// Main ingestion pipeline
pub struct IngestionPipeline {
    registry: Arc<DocumentRegistry>,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<TextChunker>,
    locks: Arc<DocumentLocks>,
    embed_timeout: Duration,
    retry_backoff: Duration,
}

impl IngestionPipeline {
    /// Create a new ingestion pipeline
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<DocumentRegistry>,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        loader: Arc<dyn DocumentLoader>,
        chunker: Arc<TextChunker>,
        locks: Arc<DocumentLocks>,
        embed_timeout: Duration,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            registry,
            index,
            embedder,
            loader,
            chunker,
            locks,
            embed_timeout,
            retry_backoff,
        }
    }

    /// Ingest one document as a single logical unit of work
    pub async fn ingest(
        &self,
        data: Vec<u8>,
        filename: &str,
        format: DocumentFormat,
    ) -> Result<Document> {
        let content_hash = hex::encode(Sha256::digest(&data));

        let doc = {
            let registry = Arc::clone(&self.registry);
            let filename = filename.to_string();
            let hash = content_hash.clone();
            tokio::task::spawn_blocking(move || registry.create(&filename, format, &hash))
                .await
                .map_err(|e| Error::internal(format!("Task join error: {}", e)))??
        };
        tracing::info!(document_id = %doc.id, filename, "Document registered, ingesting");

        let guard = self.locks.acquire(doc.id).await;
        let outcome = self.run(&doc, data, format).await;
        drop(guard);

        match outcome {
            Ok(chunk_count) => {
                tracing::info!(document_id = %doc.id, chunk_count, "Document indexed");
                let registry = Arc::clone(&self.registry);
                let id = doc.id;
                tokio::task::spawn_blocking(move || registry.get(&id))
                    .await
                    .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
            }
            Err(e) => {
                self.record_failure(&doc.id, &e).await;
                Err(e)
            }
        }
    }

    /// The fallible middle of the pipeline; holds the per-document lock
    async fn run(&self, doc: &Document, data: Vec<u8>, format: DocumentFormat) -> Result<u32> {
        // Parsing and chunking are CPU-bound; keep them off the runtime.
        let texts = {
            let loader = Arc::clone(&self.loader);
            let chunker = Arc::clone(&self.chunker);
            tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
                let text = loader.load(&data, format)?;
                // Whitespace-only extractions count as empty.
                Ok(chunker.split(text.trim()))
            })
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))??
        };

        if texts.is_empty() {
            return Err(Error::EmptyDocument(doc.filename.clone()));
        }

        let embeddings = embed_with_retry(
            self.embedder.as_ref(),
            &texts,
            self.embed_timeout,
            self.retry_backoff,
        )
        .await?;

        let entries: Vec<IndexEntry> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| IndexEntry {
                chunk_id: Chunk::derive_id(&doc.id, i as u32),
                document_id: doc.id,
                content,
                embedding,
            })
            .collect();

        // Insert and registry commit run to completion in a blocking task:
        // a caller dropping the ingest future cannot leave chunks visible
        // without the matching registry state.
        let registry = Arc::clone(&self.registry);
        let index = Arc::clone(&self.index);
        let doc_id = doc.id;
        let chunk_count = entries.len() as u32;

        tokio::task::spawn_blocking(move || -> Result<()> {
            index.insert(&entries)?;
            if let Err(e) = registry.mark_indexed(&doc_id, chunk_count) {
                match index.delete_by_document(&doc_id) {
                    Ok(purged) => {
                        tracing::warn!(document_id = %doc_id, purged, "Rolled back index after registry failure")
                    }
                    Err(purge_err) => {
                        tracing::error!(document_id = %doc_id, %purge_err, "Rollback after registry failure also failed")
                    }
                }
                return Err(e);
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        Ok(chunk_count)
    }

    /// Best-effort `pending → failed` transition with the reason recorded
    async fn record_failure(&self, document_id: &Uuid, error: &Error) {
        tracing::warn!(document_id = %document_id, %error, "Ingestion failed");

        let registry = Arc::clone(&self.registry);
        let id = *document_id;
        let reason = error.to_string();
        let marked = tokio::task::spawn_blocking(move || registry.mark_failed(&id, &reason)).await;

        match marked {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(document_id = %document_id, %e, "Failed to record ingestion failure")
            }
            Err(e) => tracing::error!(document_id = %document_id, %e, "Task join error"),
        }
    }
}
