//! Application-scoped engine state
//!
//! Constructed once at startup and passed to all callers; cloning the
//! handle is cheap. Owns the registry, the vector index, the pipelines,
//! and the per-document lock map.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::ingestion::{DocumentLoader, DocumentLocks, IngestionPipeline, TextChunker};
use crate::providers::EmbeddingProvider;
use crate::retrieval::RetrievalPipeline;
use crate::storage::{DocumentRegistry, VectorIndex};
use crate::types::{Document, DocumentFormat, QueryRequest, RetrievalResult};

/// Shared engine handle
#[derive(Clone)]
pub struct RagEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: RagConfig,
    registry: Arc<DocumentRegistry>,
    index: Arc<VectorIndex>,
    ingestion: IngestionPipeline,
    retrieval: RetrievalPipeline,
    locks: Arc<DocumentLocks>,
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine").finish_non_exhaustive()
    }
}

impl RagEngine {
    /// Open the engine: validate config, open both stores, build pipelines
    ///
    /// Both stores are durable; on restart they already agree (every
    /// mutation commits the index before the registry acknowledges it), so
    /// no reconciliation pass runs here.
    pub fn open(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Result<Self> {
        config.validate()?;

        if embedder.dimensions() != config.embedding.dimensions {
            return Err(Error::Config(format!(
                "provider '{}' produces {} dimensions but the config expects {}",
                embedder.name(),
                embedder.dimensions(),
                config.embedding.dimensions
            )));
        }

        std::fs::create_dir_all(&config.storage.data_dir)?;

        let registry = Arc::new(DocumentRegistry::new(config.storage.registry_path())?);
        let index = Arc::new(VectorIndex::new(
            config.storage.index_path(),
            config.embedding.dimensions,
        )?);
        let chunker = Arc::new(TextChunker::new(
            config.chunking.chunk_size,
            config.chunking.overlap,
        )?);
        let locks = Arc::new(DocumentLocks::new());

        let ingestion = IngestionPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&index),
            Arc::clone(&embedder),
            loader,
            chunker,
            Arc::clone(&locks),
            config.embedding.timeout(),
            config.embedding.retry_backoff(),
        );

        let retrieval = RetrievalPipeline::new(
            Arc::clone(&index),
            embedder,
            config.embedding.timeout(),
            config.embedding.retry_backoff(),
        );

        tracing::info!(
            data_dir = %config.storage.data_dir.display(),
            entries = index.len(),
            "Engine opened"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                index,
                ingestion,
                retrieval,
                locks,
            }),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Ingest a document; the format is inferred from the filename
    pub async fn ingest(&self, data: Vec<u8>, filename: &str) -> Result<Document> {
        let format = DocumentFormat::from_filename(filename)?;
        self.ingest_as(data, filename, format).await
    }

    /// Ingest a document with an explicit format
    pub async fn ingest_as(
        &self,
        data: Vec<u8>,
        filename: &str,
        format: DocumentFormat,
    ) -> Result<Document> {
        self.inner.ingestion.ingest(data, filename, format).await
    }

    /// Retrieve ranked chunks for a query
    pub async fn retrieve(&self, request: QueryRequest) -> Result<RetrievalResult> {
        self.inner.retrieval.retrieve(request).await
    }

    /// Retrieve context and assemble the grounded prompt for the LLM layer
    pub async fn retrieve_grounded(&self, request: QueryRequest) -> Result<(RetrievalResult, String)> {
        let question = request.question.clone();
        let result = self.retrieve(request).await?;
        let context = PromptBuilder::build_context(&result.chunks);
        let prompt = PromptBuilder::build_grounded_prompt(&question, &context);
        Ok((result, prompt))
    }

    /// Delete a document and purge its chunks
    ///
    /// Ordering contract: the index purge must succeed before the registry
    /// record is removed. If the purge fails the record stays, so every
    /// `indexed` registry entry always has its full chunk set present.
    pub async fn delete_document(&self, document_id: &Uuid) -> Result<Document> {
        let id = *document_id;
        let guard = self.inner.locks.acquire(id).await;

        let registry = Arc::clone(&self.inner.registry);
        let index = Arc::clone(&self.inner.index);

        let result = tokio::task::spawn_blocking(move || -> Result<Document> {
            let doc = registry.get(&id)?;
            let purged = index.delete_by_document(&id)?;
            registry.delete(&id)?;
            tracing::info!(document_id = %id, purged, "Document deleted");
            Ok(doc)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?;

        drop(guard);
        if result.is_ok() {
            self.inner.locks.remove(&id);
        }
        result
    }

    /// Get a document by id
    pub async fn get_document(&self, document_id: &Uuid) -> Result<Document> {
        let registry = Arc::clone(&self.inner.registry);
        let id = *document_id;
        tokio::task::spawn_blocking(move || registry.get(&id))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }

    /// List all documents
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let registry = Arc::clone(&self.inner.registry);
        tokio::task::spawn_blocking(move || registry.list())
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }

    /// Verify the registry/index invariant
    ///
    /// Every indexed document's chunk count must match the index, and every
    /// index entry must belong to a registered document. Should never fail
    /// when the pipeline ordering contracts are honored.
    pub async fn verify_consistency(&self) -> Result<()> {
        let registry = Arc::clone(&self.inner.registry);
        let index = Arc::clone(&self.inner.index);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let expected = registry.indexed_chunk_counts()?;
            let actual = index.document_chunk_counts();

            for (doc_id, count) in &expected {
                match actual.get(doc_id) {
                    Some(found) if found == count => {}
                    Some(found) => {
                        return Err(Error::IndexConsistency(format!(
                            "document {} is indexed with {} chunks but the index holds {}",
                            doc_id, count, found
                        )));
                    }
                    None => {
                        return Err(Error::IndexConsistency(format!(
                            "document {} is indexed with {} chunks but the index holds none",
                            doc_id, count
                        )));
                    }
                }
            }

            let registered: std::collections::HashSet<Uuid> =
                registry.list()?.into_iter().map(|d| d.id).collect();
            for doc_id in actual.keys() {
                if !registered.contains(doc_id) {
                    return Err(Error::IndexConsistency(format!(
                        "index holds chunks for unregistered document {}",
                        doc_id
                    )));
                }
            }

            Ok(())
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
        .inspect_err(|e| tracing::error!(%e, "Consistency check failed"))
    }

    /// Flush and close the engine
    ///
    /// Every mutation commits before returning, so close only logs; the
    /// SQLite handles release on drop.
    pub fn close(self) {
        tracing::info!("Engine closed");
    }
}
