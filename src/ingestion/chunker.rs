//! Text chunking with a fixed sliding window

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Text chunker with configurable size and overlap
///
/// The window slides over grapheme clusters, so splitting never lands inside
/// a multi-byte character and identical input always yields an identical
/// sequence of chunks.
pub struct TextChunker {
    /// Target chunk size in grapheme clusters
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; requires `0 <= overlap < chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Split text into overlapping chunks
    ///
    /// Empty text yields no chunks; text shorter than the chunk size yields
    /// exactly one.
    pub fn split(&self, text: &str) -> Vec<String> {
        let graphemes: Vec<&str> = text.graphemes(true).collect();
        if graphemes.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(graphemes.len());
            chunks.push(graphemes[start..end].concat());
            if end == graphemes.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(10, 2).unwrap();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_short_text_yields_one_chunk() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let chunks = chunker.split("short text");
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_window_and_overlap() {
        let chunker = TextChunker::new(4, 2).unwrap();
        let chunks = chunker.split("abcdefgh");
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh"]);
    }

    #[test]
    fn test_trailing_remainder_is_kept() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let chunks = chunker.split("abcdefg");
        assert_eq!(chunks, vec!["abcd", "defg"]);

        let chunks = chunker.split("abcdefgh");
        assert_eq!(chunks, vec!["abcd", "defg", "gh"]);
    }

    #[test]
    fn test_split_is_idempotent() {
        let chunker = TextChunker::new(7, 3).unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(chunker.split(text), chunker.split(text));
    }

    #[test]
    fn test_grapheme_boundaries_survive() {
        let chunker = TextChunker::new(3, 1).unwrap();
        let text = "héllo wörld émoji 🦀🦀";
        for chunk in chunker.split(text) {
            // Every chunk must be valid UTF-8 slices of the input
            assert!(text.contains(&chunk));
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(5, 5).is_err());
        assert!(TextChunker::new(5, 6).is_err());
        assert!(TextChunker::new(5, 4).is_ok());
    }
}
