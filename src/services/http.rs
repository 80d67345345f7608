//! HTTP backends for OpenAI-compatible APIs
//!
//! Both backends speak the OpenAI wire format, which is also served by
//! Azure OpenAI and local servers (vLLM, Ollama, LM Studio,
//! text-embeddings-inference).

use super::traits::{CompletionBackend, EmbeddingBackend, ServiceError, ServiceResult};
use crate::config::{CompletionServiceConfig, EmbeddingServiceConfig};
use crate::types::Embedding;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// OpenAI embedding request format
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

/// OpenAI embedding response format
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI chat completion request format
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI chat completion response format
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI error response format
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Build a client with auth headers resolved from config or environment
fn build_client(
    api_key: &Option<String>,
    endpoint: &str,
    timeout_secs: u64,
) -> ServiceResult<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let api_key = api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    if let Some(key) = &api_key {
        let auth_value = format!("Bearer {}", key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| ServiceError::Config(format!("Invalid API key format: {}", e)))?,
        );
    } else if endpoint.contains("openai.com") || endpoint.contains("azure.com") {
        warn!("No API key provided for {}", endpoint);
    }

    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .default_headers(headers)
        .build()
        .map_err(|e| ServiceError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map non-success HTTP responses to service errors
async fn error_from_response(response: reqwest::Response) -> ServiceError {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|s| s * 1000);
        return ServiceError::RateLimited {
            retry_after_ms: retry_after,
        };
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
        return ServiceError::RequestFailed(format!(
            "API error ({}): {}",
            status, error_response.error.message
        ));
    }

    ServiceError::RequestFailed(format!("HTTP error ({}): {}", status, error_text))
}

/// Embedding backend for OpenAI-compatible APIs
#[derive(Debug)]
pub struct HttpEmbeddingBackend {
    client: Client,
    config: EmbeddingServiceConfig,
}

impl HttpEmbeddingBackend {
    pub fn new(config: EmbeddingServiceConfig) -> ServiceResult<Self> {
        info!(
            "Initializing HTTP embedding backend: endpoint={}, model={}, {} dimensions",
            config.endpoint, config.model, config.dimensions
        );
        let client = build_client(&config.api_key, &config.endpoint, config.timeout_secs)?;
        Ok(Self { client, config })
    }

    async fn request_embeddings(&self, texts: &[&str]) -> ServiceResult<Vec<Embedding>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.to_vec(),
            // Only send dimensions for models that accept the parameter
            dimensions: if self.config.model.contains("text-embedding-3") {
                Some(self.config.dimensions)
            } else {
                None
            },
            encoding_format: "float",
        };

        debug!(
            "Sending embedding request to {} for {} texts",
            self.config.endpoint,
            texts.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let mut data = embedding_response.data;
        data.sort_by_key(|d| d.index);

        Ok(data
            .into_iter()
            .map(|d| normalize_embedding(&d.embedding))
            .collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn embed(&self, text: &str) -> ServiceResult<Embedding> {
        let embeddings = self.request_embeddings(&[text]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::MalformedResponse("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> ServiceResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

        if text_refs.len() <= self.config.max_batch_size {
            return self.request_embeddings(&text_refs).await;
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in text_refs.chunks(self.config.max_batch_size) {
            let embeddings = self.request_embeddings(chunk).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Completion backend for OpenAI-compatible chat APIs
#[derive(Debug)]
pub struct HttpCompletionBackend {
    client: Client,
    config: CompletionServiceConfig,
}

impl HttpCompletionBackend {
    pub fn new(config: CompletionServiceConfig) -> ServiceResult<Self> {
        info!(
            "Initializing HTTP completion backend: endpoint={}, model={}",
            config.endpoint, config.model
        );
        let client = build_client(&config.api_key, &config.endpoint, config.timeout_secs)?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, prompt: &str) -> ServiceResult<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        debug!(
            "Sending completion request to {} ({} prompt chars)",
            self.config.endpoint,
            prompt.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ServiceError::MalformedResponse("No completion choices returned".to_string()))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Normalize an embedding vector to unit length
fn normalize_embedding(embedding: &Embedding) -> Embedding {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding.clone()
    }
}
