//! Service backend trait definitions

use crate::types::Embedding;
use std::fmt::Debug;

/// Errors that can occur when calling an external service
///
/// These never escape the pipeline: each stage recovers with its
/// documented fallback and logs the failure.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service call failed
    #[error("service call failed: {0}")]
    RequestFailed(String),

    /// Rate limited by the API
    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds, if provided by the API
        retry_after_ms: Option<u64>,
    },

    /// The service responded with something unusable
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Network or HTTP error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Embedding service: text in, fixed-length vector out
///
/// Object-safe for use as `dyn EmbeddingBackend`; implementations must
/// be cheap to share behind an `Arc`.
#[async_trait::async_trait]
pub trait EmbeddingBackend: Send + Sync + Debug {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> ServiceResult<Embedding>;

    /// Generate embeddings for a batch of texts
    ///
    /// The default implementation calls `embed` per text; HTTP backends
    /// override it with real batching.
    async fn embed_batch(&self, texts: &[String]) -> ServiceResult<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// The embedding dimensions this backend produces
    fn dimensions(&self) -> usize;

    /// Backend name for logging (e.g., "http")
    fn name(&self) -> &str;
}

/// Completion service: prompt in, generated text out
///
/// Used for query paraphrasing, hypothetical-answer generation, and
/// relevance scoring.
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync + Debug {
    /// Generate a completion for the prompt
    async fn complete(&self, prompt: &str) -> ServiceResult<String>;

    /// Backend name for logging (e.g., "http")
    fn name(&self) -> &str;
}
