//! Durable vector index with deterministic nearest-neighbor search
//!
//! Entries are persisted to SQLite; searches run against an immutable
//! in-memory snapshot of the last committed state. Writers commit to the
//! database first and only then swap in an updated snapshot, so readers
//! always see a fully committed index and are never blocked by a write in
//! progress (read-committed semantics).

use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};

/// One persisted chunk entry: id, owning document, text payload, embedding
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Chunk id (unique across the index)
    pub chunk_id: String,
    /// Owning document id
    pub document_id: Uuid,
    /// Chunk text payload
    pub content: String,
    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// A search hit, ordered by ascending distance
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Chunk id
    pub chunk_id: String,
    /// Owning document id
    pub document_id: Uuid,
    /// Chunk text payload
    pub content: String,
    /// Cosine distance to the query (lower is closer)
    pub distance: f32,
}

/// SQLite-backed vector index
pub struct VectorIndex {
    conn: Arc<Mutex<Connection>>,
    /// Last fully-committed state, shared with readers
    snapshot: RwLock<Arc<Vec<IndexEntry>>>,
    dimensions: usize,
}

impl VectorIndex {
    /// Create or open the index database at the given path
    pub fn new<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open index database: {}", e)))?;

        let index = Self {
            conn: Arc::new(Mutex::new(conn)),
            snapshot: RwLock::new(Arc::new(Vec::new())),
            dimensions,
        };
        index.migrate()?;
        index.reload()?;
        Ok(index)
    }

    /// Create an in-memory index (for testing)
    #[cfg(test)]
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;
        let index = Self {
            conn: Arc::new(Mutex::new(conn)),
            snapshot: RwLock::new(Arc::new(Vec::new())),
            dimensions,
        };
        index.migrate()?;
        Ok(index)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS index_entries (
                chunk_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_index_entries_document_id ON index_entries(document_id);
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to run index migrations: {}", e)))?;

        tracing::info!("Vector index migrations complete");
        Ok(())
    }

    /// Rebuild the in-memory snapshot from persisted state
    fn reload(&self) -> Result<()> {
        let entries = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT chunk_id, document_id, content, embedding FROM index_entries ORDER BY chunk_id")
                .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map([], |row| {
                    let chunk_id: String = row.get(0)?;
                    let document_id: String = row.get(1)?;
                    let content: String = row.get(2)?;
                    let blob: Vec<u8> = row.get(3)?;
                    Ok((chunk_id, document_id, content, blob))
                })
                .map_err(|e| Error::storage(format!("Failed to load index entries: {}", e)))?;

            let mut entries = Vec::new();
            for row in rows {
                let (chunk_id, document_id, content, blob) =
                    row.map_err(|e| Error::storage(format!("Failed to read index row: {}", e)))?;
                let document_id = Uuid::parse_str(&document_id).map_err(|e| {
                    Error::storage(format!("Corrupt document id '{}': {}", document_id, e))
                })?;
                let embedding = decode_embedding(&blob, self.dimensions)?;
                entries.push(IndexEntry {
                    chunk_id,
                    document_id,
                    content,
                    embedding,
                });
            }
            entries
        };

        tracing::info!(entries = entries.len(), "Vector index snapshot loaded");
        *self.snapshot.write() = Arc::new(entries);
        Ok(())
    }

    /// Insert a batch of entries as one atomic unit
    ///
    /// On any failure nothing becomes visible, neither on disk nor to
    /// concurrent searches.
    pub fn insert(&self, entries: &[IndexEntry]) -> Result<()> {
        for entry in entries {
            if entry.embedding.len() != self.dimensions {
                return Err(Error::IndexConsistency(format!(
                    "chunk {} has embedding dimension {} but the index expects {}",
                    entry.chunk_id,
                    entry.embedding.len(),
                    self.dimensions
                )));
            }
        }

        {
            let mut conn = self.conn.lock();
            let tx = conn
                .transaction()
                .map_err(|e| Error::storage(format!("Failed to begin transaction: {}", e)))?;

            for entry in entries {
                tx.execute(
                    "INSERT INTO index_entries (chunk_id, document_id, content, embedding) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        entry.chunk_id,
                        entry.document_id.to_string(),
                        entry.content,
                        encode_embedding(&entry.embedding),
                    ],
                )
                .map_err(|e| Error::storage(format!("Failed to insert chunk {}: {}", entry.chunk_id, e)))?;
            }

            tx.commit()
                .map_err(|e| Error::storage(format!("Failed to commit insert: {}", e)))?;
        }

        // Committed; publish the new snapshot to readers.
        let mut snapshot = self.snapshot.write();
        let mut next = snapshot.as_ref().clone();
        next.extend_from_slice(entries);
        *snapshot = Arc::new(next);

        Ok(())
    }

    /// Remove every entry belonging to a document; no-op if none match
    pub fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let deleted = {
            let conn = self.conn.lock();
            conn.execute(
                "DELETE FROM index_entries WHERE document_id = ?1",
                params![document_id.to_string()],
            )
            .map_err(|e| Error::storage(format!("Failed to delete document entries: {}", e)))?
        };

        if deleted > 0 {
            let mut snapshot = self.snapshot.write();
            let next: Vec<IndexEntry> = snapshot
                .iter()
                .filter(|e| e.document_id != *document_id)
                .cloned()
                .collect();
            *snapshot = Arc::new(next);
        }

        Ok(deleted)
    }

    /// Return the `k` entries closest to the query vector
    ///
    /// Ascending by cosine distance, ties broken by chunk id ascending.
    /// `k` larger than the index returns everything; an empty index returns
    /// an empty vec. Never blocks on writers.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(Error::provider(format!(
                "query embedding has dimension {} but the index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let snapshot = Arc::clone(&self.snapshot.read());

        let mut hits: Vec<SearchHit> = snapshot
            .iter()
            .map(|entry| SearchHit {
                chunk_id: entry.chunk_id.clone(),
                document_id: entry.document_id,
                content: entry.content.clone(),
                distance: cosine_distance(query, &entry.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    /// Whether the index holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-document entry counts, for consistency verification
    pub fn document_chunk_counts(&self) -> HashMap<Uuid, u32> {
        let snapshot = Arc::clone(&self.snapshot.read());
        let mut counts: HashMap<Uuid, u32> = HashMap::new();
        for entry in snapshot.iter() {
            *counts.entry(entry.document_id).or_default() += 1;
        }
        counts
    }
}

/// Encode an embedding as little-endian f32 bytes
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode an embedding blob, validating its dimensionality
fn decode_embedding(blob: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    if blob.len() != dimensions * 4 {
        return Err(Error::storage(format!(
            "embedding blob of {} bytes does not match {} dimensions",
            blob.len(),
            dimensions
        )));
    }

    let mut embedding = Vec::with_capacity(dimensions);
    for bytes in blob.chunks_exact(4) {
        embedding.push(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
    }
    Ok(embedding)
}

/// Cosine distance: `1 - cos(a, b)`, in `[0, 2]`
///
/// A zero vector on either side yields the maximum distance rather than NaN.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunk_id: &str, doc: Uuid, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: chunk_id.to_string(),
            document_id: doc,
            content: format!("content of {}", chunk_id),
            embedding,
        }
    }

    #[test]
    fn test_insert_and_search_order() {
        let index = VectorIndex::in_memory(3).unwrap();
        let doc = Uuid::new_v4();

        index
            .insert(&[
                entry("a", doc, vec![1.0, 0.0, 0.0]),
                entry("b", doc, vec![0.0, 1.0, 0.0]),
                entry("c", doc, vec![0.9, 0.1, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "a");
        assert_eq!(hits[1].chunk_id, "c");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_tie_break_by_chunk_id() {
        let index = VectorIndex::in_memory(2).unwrap();
        let doc = Uuid::new_v4();

        // Identical vectors: equal distances, so ordering falls back to ids.
        index
            .insert(&[
                entry("z", doc, vec![1.0, 0.0]),
                entry("a", doc, vec![1.0, 0.0]),
                entry("m", doc, vec![1.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_search_is_deterministic() {
        let index = VectorIndex::in_memory(2).unwrap();
        let doc = Uuid::new_v4();
        index
            .insert(&[
                entry("a", doc, vec![0.5, 0.5]),
                entry("b", doc, vec![0.4, 0.6]),
                entry("c", doc, vec![0.9, 0.1]),
            ])
            .unwrap();

        let first = index.search(&[0.7, 0.3], 3).unwrap();
        let second = index.search(&[0.7, 0.3], 3).unwrap();
        let ids = |hits: &[SearchHit]| hits.iter().map(|h| h.chunk_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_empty_index_and_oversized_k() {
        let index = VectorIndex::in_memory(2).unwrap();
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());

        let doc = Uuid::new_v4();
        index.insert(&[entry("only", doc, vec![1.0, 0.0])]).unwrap();
        let hits = index.search(&[0.0, 1.0], 100).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_delete_by_document() {
        let index = VectorIndex::in_memory(2).unwrap();
        let keep = Uuid::new_v4();
        let purge = Uuid::new_v4();

        index
            .insert(&[
                entry("k1", keep, vec![1.0, 0.0]),
                entry("p1", purge, vec![0.0, 1.0]),
                entry("p2", purge, vec![0.5, 0.5]),
            ])
            .unwrap();

        assert_eq!(index.delete_by_document(&purge).unwrap(), 2);
        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 1.0], 10).unwrap();
        assert!(hits.iter().all(|h| h.document_id == keep));

        // Deleting again is a no-op
        assert_eq!(index.delete_by_document(&purge).unwrap(), 0);
    }

    #[test]
    fn test_insert_is_all_or_nothing() {
        let index = VectorIndex::in_memory(2).unwrap();
        let doc = Uuid::new_v4();

        let result = index.insert(&[
            entry("good", doc, vec![1.0, 0.0]),
            entry("bad", doc, vec![1.0, 0.0, 0.0]),
        ]);
        assert!(matches!(result, Err(Error::IndexConsistency(_))));
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 10).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_chunk_id_rolls_back_batch() {
        let index = VectorIndex::in_memory(2).unwrap();
        let doc = Uuid::new_v4();
        index.insert(&[entry("dup", doc, vec![1.0, 0.0])]).unwrap();

        let result = index.insert(&[
            entry("fresh", doc, vec![0.0, 1.0]),
            entry("dup", doc, vec![0.5, 0.5]),
        ]);
        assert!(result.is_err());
        // The conflicting batch left nothing behind, including "fresh".
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_restart_durability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let doc = Uuid::new_v4();

        {
            let index = VectorIndex::new(&path, 2).unwrap();
            index
                .insert(&[entry("persisted", doc, vec![0.6, 0.8])])
                .unwrap();
        }

        let reopened = VectorIndex::new(&path, 2).unwrap();
        assert_eq!(reopened.len(), 1);
        let hits = reopened.search(&[0.6, 0.8], 1).unwrap();
        assert_eq!(hits[0].chunk_id, "persisted");
        assert_eq!(hits[0].content, "content of persisted");
        assert!(hits[0].distance.abs() < 1e-5);
    }

    #[test]
    fn test_zero_vector_distance_is_max() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
    }

    #[test]
    fn test_document_chunk_counts() {
        let index = VectorIndex::in_memory(2).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        index
            .insert(&[
                entry("a1", a, vec![1.0, 0.0]),
                entry("a2", a, vec![0.0, 1.0]),
                entry("b1", b, vec![0.5, 0.5]),
            ])
            .unwrap();

        let counts = index.document_chunk_counts();
        assert_eq!(counts[&a], 2);
        assert_eq!(counts[&b], 1);
    }
}
