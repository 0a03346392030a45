//! SQLite-backed document registry
//!
//! Authoritative ledger of ingested documents. Every mutation is committed
//! before the call returns, so the registry survives restart as-is.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Document, DocumentFormat, DocumentStatus};

/// Document registry over SQLite
pub struct DocumentRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentRegistry {
    /// Create or open the registry database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open registry database: {}", e)))?;
        let registry = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        registry.migrate()?;
        Ok(registry)
    }

    /// Create an in-memory registry (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;
        let registry = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        registry.migrate()?;
        Ok(registry)
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
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                format TEXT NOT NULL,
                status TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                metadata TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            CREATE INDEX IF NOT EXISTS idx_documents_filename ON documents(filename);
            CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash);
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to run registry migrations: {}", e)))?;

        tracing::info!("Registry migrations complete");
        Ok(())
    }

    /// Create a new pending document record
    pub fn create(
        &self,
        filename: &str,
        format: DocumentFormat,
        content_hash: &str,
    ) -> Result<Document> {
        let doc = Document::new(filename.to_string(), format, content_hash.to_string());
        let conn = self.conn.lock();

        let metadata_json = serde_json::to_string(&doc.metadata)?;
        conn.execute(
            r#"
            INSERT INTO documents (id, filename, format, status, chunk_count, error, content_hash, created_at, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                doc.id.to_string(),
                doc.filename,
                doc.format.as_str(),
                doc.status.as_str(),
                doc.chunk_count as i64,
                doc.error,
                doc.content_hash,
                doc.created_at.to_rfc3339(),
                metadata_json,
            ],
        )
        .map_err(|e| Error::storage(format!("Failed to create document record: {}", e)))?;

        Ok(doc)
    }

    /// Transition `pending → indexed` and record the chunk count
    pub fn mark_indexed(&self, document_id: &Uuid, chunk_count: u32) -> Result<()> {
        self.transition(document_id, "mark indexed", |conn, id| {
            conn.execute(
                "UPDATE documents SET status = 'indexed', chunk_count = ?2, error = NULL WHERE id = ?1",
                params![id, chunk_count as i64],
            )
        })
    }

    /// Transition `pending → failed` and record the reason
    pub fn mark_failed(&self, document_id: &Uuid, reason: &str) -> Result<()> {
        self.transition(document_id, "mark failed", |conn, id| {
            conn.execute(
                "UPDATE documents SET status = 'failed', chunk_count = 0, error = ?2 WHERE id = ?1",
                params![id, reason],
            )
        })
    }

    /// Apply a `pending → terminal` transition, enforcing the state machine
    fn transition<F>(&self, document_id: &Uuid, action: &'static str, update: F) -> Result<()>
    where
        F: FnOnce(&Connection, &str) -> rusqlite::Result<usize>,
    {
        let conn = self.conn.lock();
        let id = document_id.to_string();

        let status: Option<String> = conn
            .query_row("SELECT status FROM documents WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| Error::storage(format!("Failed to read document status: {}", e)))?;

        let status = match status {
            Some(s) => DocumentStatus::parse(&s)?,
            None => return Err(Error::NotFound(id)),
        };

        if status != DocumentStatus::Pending {
            return Err(Error::InvalidTransition {
                document_id: id,
                from: status,
                action,
            });
        }

        update(&conn, &id)
            .map_err(|e| Error::storage(format!("Failed to {}: {}", action, e)))?;
        Ok(())
    }

    /// Remove a document record; valid from any status
    pub fn delete(&self, document_id: &Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "DELETE FROM documents WHERE id = ?1",
                params![document_id.to_string()],
            )
            .map_err(|e| Error::storage(format!("Failed to delete document record: {}", e)))?;

        if count == 0 {
            return Err(Error::NotFound(document_id.to_string()));
        }
        Ok(())
    }

    /// Get a document by id
    pub fn get(&self, document_id: &Uuid) -> Result<Document> {
        let conn = self.conn.lock();
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![document_id.to_string()],
                row_to_document,
            )
            .optional()
            .map_err(|e| Error::storage(format!("Failed to get document: {}", e)))?;

        doc.ok_or_else(|| Error::NotFound(document_id.to_string()))
    }

    /// List all documents, ordered by creation time then id
    pub fn list(&self) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM documents ORDER BY created_at, id")
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let docs = stmt
            .query_map([], row_to_document)
            .map_err(|e| Error::storage(format!("Failed to list documents: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage(format!("Failed to read document row: {}", e)))?;

        Ok(docs)
    }

    /// Find a document by filename
    pub fn find_by_filename(&self, filename: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM documents WHERE filename = ?1 ORDER BY created_at DESC LIMIT 1",
            params![filename],
            row_to_document,
        )
        .optional()
        .map_err(|e| Error::storage(format!("Failed to find document by filename: {}", e)))
    }

    /// Find a document by content hash
    pub fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM documents WHERE content_hash = ?1 LIMIT 1",
            params![content_hash],
            row_to_document,
        )
        .optional()
        .map_err(|e| Error::storage(format!("Failed to find document by hash: {}", e)))
    }

    /// Chunk counts of all indexed documents, keyed by id
    pub fn indexed_chunk_counts(&self) -> Result<HashMap<Uuid, u32>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, chunk_count FROM documents WHERE status = 'indexed'")
            .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((id, count))
            })
            .map_err(|e| Error::storage(format!("Failed to query chunk counts: {}", e)))?;

        let mut counts = HashMap::new();
        for row in rows {
            let (id, count) =
                row.map_err(|e| Error::storage(format!("Failed to read row: {}", e)))?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| Error::storage(format!("Corrupt document id '{}': {}", id, e)))?;
            counts.insert(id, count as u32);
        }
        Ok(counts)
    }
}

/// Map a database row to a Document
fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    let id: String = row.get("id")?;
    let format: String = row.get("format")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let metadata: Option<String> = row.get("metadata")?;

    Ok(Document {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        filename: row.get("filename")?,
        format: DocumentFormat::parse(&format).unwrap_or(DocumentFormat::Txt),
        status: DocumentStatus::parse(&status).unwrap_or(DocumentStatus::Failed),
        chunk_count: row.get::<_, i64>("chunk_count")? as u32,
        error: row.get("error")?,
        content_hash: row.get("content_hash")?,
        created_at: created_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
        metadata: metadata
            .and_then(|m| serde_json::from_str(&m).ok())
            .unwrap_or_default(),
    })
}
