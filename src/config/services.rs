//! External service configuration (embeddings, completions)

use serde::{Deserialize, Serialize};

/// Configuration for an OpenAI-compatible embedding endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingServiceConfig {
    /// API endpoint (e.g., "https://api.openai.com/v1/embeddings")
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    /// API key; falls back to the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name (e.g., "text-embedding-3-small")
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum texts per request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_max_batch_size() -> usize {
    100
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            timeout_secs: default_embedding_timeout_secs(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Configuration for an OpenAI-compatible chat completion endpoint,
/// used for query expansion and reranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionServiceConfig {
    /// API endpoint (e.g., "https://api.openai.com/v1/chat/completions")
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,
    /// API key; falls back to the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name
    #[serde(default = "default_completion_model")]
    pub model: String,
    /// Sampling temperature; 0.0 keeps rerank scoring deterministic
    #[serde(default)]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_completion_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_completion_timeout_secs() -> u64 {
    30
}

impl Default for CompletionServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            api_key: None,
            model: default_completion_model(),
            temperature: 0.0,
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}
