//! Persistent storage: document registry and vector index

pub mod registry;
pub mod vector_index;

pub use registry::DocumentRegistry;
pub use vector_index::{IndexEntry, SearchHit, VectorIndex};
