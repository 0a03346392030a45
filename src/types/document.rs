//! Document and chunk types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Supported document formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// HTML document
    Html,
    /// Plain text file
    Txt,
    /// CSV file
    Csv,
}

impl DocumentFormat {
    /// Detect format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" => Some(Self::Html),
            "txt" | "text" => Some(Self::Txt),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Detect format from a filename
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename.rsplit('.').next().unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| {
            Error::load(filename, format!("unsupported file type '.{}'", ext))
        })
    }

    /// Stable tag used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Txt => "txt",
            Self::Csv => "csv",
        }
    }

    /// Parse a stored tag
    pub fn parse(tag: &str) -> Result<Self> {
        Self::from_extension(tag)
            .ok_or_else(|| Error::storage(format!("unknown document format tag '{}'", tag)))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion status of a document
///
/// `Pending` transitions to `Indexed` or `Failed`; both are terminal,
/// except that deletion is valid from any state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Created, not yet indexed
    Pending,
    /// All chunks committed to the vector index
    Indexed,
    /// Ingestion failed; no chunks are indexed
    Failed,
}

impl DocumentStatus {
    /// Stable tag used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored tag
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "pending" => Ok(Self::Pending),
            "indexed" => Ok(Self::Indexed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::storage(format!("unknown document status '{}'", other))),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document id, immutable after creation
    pub id: Uuid,
    /// Original filename as uploaded
    pub filename: String,
    /// Document format
    pub format: DocumentFormat,
    /// Ingestion status
    pub status: DocumentStatus,
    /// Number of chunks committed to the index (0 unless indexed)
    pub chunk_count: u32,
    /// Failure reason when status is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// SHA-256 of the raw uploaded bytes
    pub content_hash: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Create a new pending document
    pub fn new(filename: String, format: DocumentFormat, content_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            format,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            error: None,
            content_hash,
            created_at: chrono::Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

/// A chunk of a document's extracted text
///
/// Immutable once created; destroyed only as part of a document purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk id, derived from the owning document id and sequence index
    pub id: String,
    /// Owning document id
    pub document_id: Uuid,
    /// Raw text content
    pub content: String,
    /// Embedding vector (provider-defined, fixed dimensionality)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Sequence index within the document
    pub index: u32,
}

impl Chunk {
    /// Derive the chunk id for a document and sequence index
    ///
    /// Zero-padded so lexicographic order matches sequence order.
    pub fn derive_id(document_id: &Uuid, index: u32) -> String {
        format!("{}:{:05}", document_id, index)
    }

    /// Create a new chunk without an embedding
    pub fn new(document_id: Uuid, content: String, index: u32) -> Self {
        Self {
            id: Self::derive_id(&document_id, index),
            document_id,
            content,
            embedding: Vec::new(),
            index,
        }
    }
}
