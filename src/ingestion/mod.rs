//! Document ingestion: chunking, loading, and the pipeline

pub mod chunker;
pub mod loader;
pub mod pipeline;

pub use chunker::TextChunker;
pub use loader::{DocumentLoader, FormatLoader};
pub use pipeline::{DocumentLocks, IngestionPipeline};
