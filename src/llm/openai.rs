use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmCallError, LlmProvider};
use crate::http::{self, ApiFlavor, RetryPolicy};

/// Settings for the chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Endpoint dialect.
    #[serde(default)]
    pub flavor: ApiFlavor,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name sent in the request body.
    #[serde(default = "default_model")]
    pub model: String,

    /// Azure deployment name (Azure flavor only).
    #[serde(default = "default_model")]
    pub deployment: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature for answers. Zero keeps answers reproducible.
    #[serde(default)]
    pub temperature: f32,

    /// Completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> usize {
    512
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            flavor: ApiFlavor::default(),
            base_url: default_base_url(),
            model: default_model(),
            deployment: default_model(),
            api_version: default_api_version(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chat completions client for OpenAI and Azure OpenAI.
#[derive(Clone)]
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig, api_key: &str, retry: RetryPolicy) -> Result<Self, LlmCallError> {
        if api_key.trim().is_empty() {
            return Err(LlmCallError::Config(format!(
                "missing API key (set {})",
                config.api_key_env
            )));
        }
        let headers = config
            .flavor
            .headers(api_key)
            .map_err(|_| LlmCallError::Config("invalid API key".to_string()))?;
        let client = http::build_client(Duration::from_secs(config.timeout_secs.max(1)), headers)
            .map_err(|e| LlmCallError::Config(format!("failed to build HTTP client: {e}")))?;
        let endpoint = config.flavor.endpoint(
            &config.base_url,
            &config.deployment,
            "chat/completions",
            &config.api_version,
        );

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, request: &CompletionRequest<'_>) -> Result<String, LlmCallError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt,
        });
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages,
        };

        let resp = self.client.post(&self.endpoint).json(&body).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LlmCallError::from_status(status, http::error_body(resp)));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| LlmCallError::MalformedResponse(e.to_string()))?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(LlmCallError::EmptyCompletion);
        }
        Ok(answer)
    }
}

impl LlmProvider for OpenAiChat {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmCallError> {
        self.retry.run("chat completion", |attempt| {
            tracing::debug!(
                target: "llm",
                "POST {} ({} prompt chars, attempt {attempt})",
                self.endpoint,
                request.prompt.len()
            );
            self.send(request)
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
