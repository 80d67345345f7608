//! External service backends
//!
//! Embeddings and language-model completions are opaque external
//! services behind async traits:
//!
//! - **HTTP backends**: any OpenAI-compatible API (OpenAI, Azure, local
//!   servers such as vLLM, Ollama, LM Studio)
//! - test doubles implement the same traits
//!
//! Every call site in the pipeline wraps these in its own timeout and
//! has a defined fallback; a slow or unavailable service degrades
//! quality, never correctness.
//!
//! # Example Configuration
//!
//! ```toml
//! [embedding]
//! endpoint = "https://api.openai.com/v1/embeddings"
//! model = "text-embedding-3-small"
//! dimensions = 1536
//! # api_key from OPENAI_API_KEY env var
//!
//! [completion]
//! endpoint = "http://localhost:11434/v1/chat/completions"
//! model = "llama3.1"
//! ```

mod http;
mod traits;

pub use http::{HttpCompletionBackend, HttpEmbeddingBackend};
pub use traits::{CompletionBackend, EmbeddingBackend, ServiceError, ServiceResult};

use crate::types::Embedding;

/// Generate a deterministic hash-based embedding (for tests and for
/// exercising the pipeline without a live embedding service)
///
/// Deterministic for the same content but carries no semantic meaning;
/// values land in [-1, 1] before unit normalization.
pub fn hash_based_embedding(content: &str, dims: usize) -> Embedding {
    let mut state: u64 = 0xcbf29ce484222325;
    for byte in content.as_bytes() {
        state ^= u64::from(*byte);
        state = state.wrapping_mul(0x100000001b3);
    }

    let mut embedding = Vec::with_capacity(dims);
    let mut h = state;
    for _ in 0..dims {
        h ^= h >> 33;
        h = h.wrapping_mul(0xff51afd7ed558ccd);
        h ^= h >> 33;
        embedding.push(((h % 2000) as f32 / 1000.0) - 1.0);
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
    embedding
}
