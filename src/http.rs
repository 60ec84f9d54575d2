//! Shared HTTP plumbing for provider clients.
//!
//! Every outbound call goes through a blocking `reqwest` client with a bounded
//! timeout and is retried by [`RetryPolicy`], an explicit loop with
//! exponential backoff and a maximum attempt count.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    /// True for transient failures (timeouts, rate limits, 5xx).
    fn is_retryable(&self) -> bool;
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// A policy with `max_attempts` and no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let delay = self.initial_backoff_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `call` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, operation: &str, call: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_with_sleep(operation, call, thread::sleep)
    }

    pub(crate) fn run_with_sleep<T, E, F, S>(
        &self,
        operation: &str,
        mut call: F,
        mut sleep: S,
    ) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        target: "http",
                        "{operation} failed (attempt {attempt}/{max_attempts}): {err}; retrying in {delay:?}"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 1 {
                        tracing::debug!(
                            target: "http",
                            "{operation} giving up after {attempt} attempt(s)"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// Wire dialect of an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// api.openai.com style: bearer token, model in the body.
    #[default]
    OpenAi,
    /// Azure OpenAI: `api-key` header, deployment in the path.
    Azure,
}

impl ApiFlavor {
    /// Authentication and content headers for this flavor.
    pub fn headers(&self, api_key: &str) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        match self {
            Self::OpenAi => {
                let auth = format!("Bearer {}", api_key.trim());
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth)?);
            }
            Self::Azure => {
                headers.insert("api-key", HeaderValue::from_str(api_key.trim())?);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Full URL for `operation` (e.g. `embeddings`, `chat/completions`).
    pub fn endpoint(
        &self,
        base_url: &str,
        deployment: &str,
        operation: &str,
        api_version: &str,
    ) -> String {
        match self {
            Self::OpenAi => join_url(base_url, operation),
            Self::Azure => format!(
                "{}?api-version={api_version}",
                join_url(
                    base_url,
                    &format!("openai/deployments/{deployment}/{operation}")
                )
            ),
        }
    }
}

/// Build a blocking client with default headers and a request timeout.
pub fn build_client(timeout: Duration, headers: HeaderMap) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
}

/// Read an error response body for diagnostics, never failing.
pub fn error_body(resp: Response) -> String {
    resp.text()
        .unwrap_or_else(|_| "<body unavailable>".to_string())
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
