//! Grounded prompt assembly for the layer above the core

pub mod prompt;

pub use prompt::PromptBuilder;
