//! Deterministic hashing embedder
//!
//! Maps each lowercased whitespace token to a bucket via SHA-256 and
//! L2-normalizes the result. Not a semantic model; it exists so the engine
//! can run and be tested without a network provider, with fully
//! reproducible vectors.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::embedding::EmbeddingProvider;

/// Offline embedding provider with reproducible output
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Create a hashing embedder with the given dimensionality
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text.to_lowercase().split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
                as usize
                % self.dimensions;
            // Sign from a second digest byte spreads tokens across both
            // directions, which keeps unrelated texts from all correlating.
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = HashingEmbedder::new(32);
        let a = tokio_test::block_on(embedder.embed("climate change report")).unwrap();
        let b = tokio_test::block_on(embedder.embed("climate change report")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_embedding_is_normalized() {
        let embedder = HashingEmbedder::new(32);
        let v = tokio_test::block_on(embedder.embed("some words here")).unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_tokens_are_closer() {
        let embedder = HashingEmbedder::new(64);
        let base = tokio_test::block_on(embedder.embed("quarterly revenue figures")).unwrap();
        let near = tokio_test::block_on(embedder.embed("revenue figures summary")).unwrap();
        let far = tokio_test::block_on(embedder.embed("unrelated zebra text")).unwrap();

        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&base, &near) > dot(&base, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        let v = tokio_test::block_on(embedder.embed("")).unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
