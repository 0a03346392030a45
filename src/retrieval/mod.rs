//! Retrieval: query embedding and ranked chunk search

pub mod search;

pub use search::RetrievalPipeline;
