//! Embedding provider trait and retry policy

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OllamaEmbedder`: Ollama-compatible HTTP endpoint
/// - `HashingEmbedder`: deterministic offline embedder
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, same length and order as input
    ///
    /// Default implementation calls `embed` sequentially; implementations
    /// with native batching should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensionality, agreed at startup
    fn dimensions(&self) -> usize;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Embed a batch with a bounded per-attempt timeout, retried once
///
/// A timeout or provider failure is retried a single time after `backoff`,
/// then surfaced as a provider error. A batch whose length disagrees with
/// the input is also a provider error.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    timeout: Duration,
    backoff: Duration,
) -> Result<Vec<Vec<f32>>> {
    let mut last_error = None;

    for attempt in 0..2 {
        if attempt > 0 {
            tracing::warn!(
                provider = provider.name(),
                "Embedding attempt failed, retrying after {:?}",
                backoff
            );
            tokio::time::sleep(backoff).await;
        }

        match tokio::time::timeout(timeout, provider.embed_batch(texts)).await {
            Ok(Ok(embeddings)) => {
                if embeddings.len() != texts.len() {
                    return Err(Error::provider(format!(
                        "provider '{}' returned {} embeddings for {} texts",
                        provider.name(),
                        embeddings.len(),
                        texts.len()
                    )));
                }
                return Ok(embeddings);
            }
            Ok(Err(e)) => last_error = Some(e),
            Err(_) => {
                last_error = Some(Error::provider(format!(
                    "provider '{}' timed out after {:?}",
                    provider.name(),
                    timeout
                )))
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::provider("embedding failed with no error detail")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyEmbedder {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(Error::provider("transient failure"))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_retry_once_recovers() {
        let provider = FlakyEmbedder {
            calls: AtomicUsize::new(0),
            fail_first: 1,
        };
        let texts = vec!["hello".to_string()];
        let embeddings = embed_with_retry(
            &provider,
            &texts,
            Duration::from_secs(1),
            Duration::from_millis(1),
        )
        .await
        .unwrap();
        assert_eq!(embeddings.len(), 1);
    }

    #[tokio::test]
    async fn test_second_failure_is_fatal() {
        let provider = FlakyEmbedder {
            calls: AtomicUsize::new(0),
            fail_first: 10,
        };
        let texts = vec!["hello".to_string()];
        let result = embed_with_retry(
            &provider,
            &texts,
            Duration::from_secs(1),
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(Error::Provider(_))));
        // One initial attempt plus exactly one retry
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![0.0])
        }

        fn dimensions(&self) -> usize {
            1
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_as_provider_error() {
        let texts = vec!["hello".to_string()];
        let result = embed_with_retry(
            &SlowEmbedder,
            &texts,
            Duration::from_millis(50),
            Duration::from_millis(1),
        )
        .await;
        match result {
            Err(Error::Provider(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected provider error, got {:?}", other.map(|v| v.len())),
        }
    }
}
