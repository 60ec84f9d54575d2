//! Chat completion providers.

mod openai;

pub use openai::{LlmConfig, OpenAiChat};

use reqwest::StatusCode;
use thiserror::Error;

use crate::http::Retryable;

/// Errors from LLM provider calls.
#[derive(Error, Debug)]
pub enum LlmCallError {
    #[error("LLM provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("LLM provider rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("LLM returned an empty completion")]
    EmptyCompletion,

    #[error("invalid LLM configuration: {0}")]
    Config(String),
}

impl LlmCallError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(body),
            _ => Self::Provider {
                status: status.as_u16(),
                body,
            },
        }
    }
}

impl From<reqwest::Error> for LlmCallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl Retryable for LlmCallError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Timeout | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Request envelope shared by the providers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl<'a> CompletionRequest<'a> {
    /// Deterministic request (temperature 0) without a system message.
    pub fn new(prompt: &'a str, max_tokens: usize) -> Self {
        Self {
            prompt,
            system: None,
            temperature: 0.0,
            max_tokens,
        }
    }

    pub fn with_system(mut self, system: &'a str) -> Self {
        self.system = Some(system);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Run one completion and return the raw text.
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmCallError>;
}
