//! OpenAI-compatible embedding client.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{Embedding, EmbeddingError, EmbeddingProvider};
use crate::http::{self, ApiFlavor, RetryPolicy};

/// Settings for the embedding endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Endpoint dialect.
    #[serde(default)]
    pub flavor: ApiFlavor,

    /// API base, e.g. `https://api.openai.com/v1` or the Azure resource URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent in the request body.
    #[serde(default = "default_model")]
    pub model: String,

    /// Azure deployment name (Azure flavor only).
    #[serde(default = "default_model")]
    pub deployment: String,

    /// Azure REST API version (Azure flavor only).
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Dimension of the returned vectors.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Ask the provider to shorten vectors (models that support it only).
    #[serde(default)]
    pub request_dimensions: bool,

    /// Maximum inputs per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_batch_size() -> usize {
    16
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            flavor: ApiFlavor::default(),
            base_url: default_base_url(),
            model: default_model(),
            deployment: default_model(),
            api_version: default_api_version(),
            api_key_env: default_api_key_env(),
            dimension: default_dimension(),
            request_dimensions: false,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Blocking embeddings client for OpenAI and Azure OpenAI.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    request_dimensions: bool,
    batch_size: usize,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl OpenAiEmbedder {
    /// Build a new embeddings client.
    ///
    /// # Arguments
    /// * `config` - Endpoint, model and batching settings
    /// * `api_key` - Secret resolved by the caller from `config.api_key_env`
    /// * `retry` - Policy applied to rate limits, timeouts and 5xx responses
    pub fn new(
        config: &EmbeddingConfig,
        api_key: &str,
        retry: RetryPolicy,
    ) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::Config(format!(
                "missing API key (set {})",
                config.api_key_env
            )));
        }
        if config.model.trim().is_empty() {
            return Err(EmbeddingError::Config("missing model name".to_string()));
        }
        if config.dimension == 0 {
            return Err(EmbeddingError::Config(
                "dimension must be greater than zero".to_string(),
            ));
        }

        let headers = config
            .flavor
            .headers(api_key)
            .map_err(|_| EmbeddingError::Config("invalid API key".to_string()))?;
        let client = http::build_client(Duration::from_secs(config.timeout_secs.max(1)), headers)
            .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))?;
        let endpoint = config.flavor.endpoint(
            &config.base_url,
            &config.deployment,
            "embeddings",
            &config.api_version,
        );

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            dimension: config.dimension,
            request_dimensions: config.request_dimensions,
            batch_size: config.batch_size.max(1),
            retry,
        })
    }

    /// Resolved request URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, inputs: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.request_dimensions.then_some(self.dimension),
        };
        let resp = self.client.post(&self.endpoint).json(&request).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EmbeddingError::from_status(status, http::error_body(resp)));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;
        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        parsed.data.sort_by_key(|entry| entry.index);
        if let Some((position, entry)) = parsed
            .data
            .iter()
            .enumerate()
            .find(|(position, entry)| entry.index != *position)
        {
            return Err(EmbeddingError::MalformedResponse(format!(
                "embedding index {} at position {position}, expected indices 0..{}",
                entry.index,
                inputs.len()
            )));
        }

        parsed
            .data
            .into_iter()
            .map(|entry| {
                super::check_dimension(self.dimension, &entry.embedding)?;
                Ok(entry.embedding)
            })
            .collect()
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() > self.batch_size {
            return Err(EmbeddingError::Config(format!(
                "batch of {} exceeds configured max {}",
                inputs.len(),
                self.batch_size
            )));
        }

        self.retry.run("embeddings", |attempt| {
            tracing::debug!(
                target: "embedding",
                "POST {} ({} inputs, attempt {attempt})",
                self.endpoint,
                inputs.len()
            );
            self.send(inputs)
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiEmbedder::new(&EmbeddingConfig::default(), "", RetryPolicy::once())
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_azure_endpoint() {
        let config = EmbeddingConfig {
            flavor: ApiFlavor::Azure,
            base_url: "https://hsbc-hk.openai.azure.com".to_string(),
            deployment: "ada-002".to_string(),
            ..Default::default()
        };
        let embedder = OpenAiEmbedder::new(&config, "key", RetryPolicy::once()).unwrap();
        assert_eq!(
            embedder.endpoint(),
            "https://hsbc-hk.openai.azure.com/openai/deployments/ada-002/embeddings?api-version=2023-05-15"
        );
        assert_eq!(embedder.dimension(), 1536);
    }

    #[test]
    fn test_empty_batch_makes_no_request() {
        let config = EmbeddingConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let embedder = OpenAiEmbedder::new(&config, "key", RetryPolicy::once()).unwrap();
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_request_body_shape() {
        let inputs = ["a", "b"];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &inputs,
            dimensions: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"model": "text-embedding-3-small", "input": ["a", "b"]})
        );
    }
}
