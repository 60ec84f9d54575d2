//! OCR for scanned images through the Azure Form Recognizer read model.
//!
//! The service is asynchronous: the image is submitted to
//! `documentModels/{model}:analyze`, which answers `202 Accepted` with an
//! `Operation-Location` header that is polled until the analysis finishes.

use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DocumentLoader, DocumentParseError};
use crate::documents::types::{DocumentSource, PageText};
use crate::http::{self, Retryable, RetryPolicy};

const KEY_HEADER: &str = "ocp-apim-subscription-key";

/// Settings for the Form Recognizer endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Enable OCR for PNG and JPEG documents.
    #[serde(default)]
    pub enabled: bool,

    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`.
    #[serde(default)]
    pub endpoint: String,

    /// Environment variable holding the subscription key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// REST API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Delay between status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up after this many polls.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "FORM_RECOGNISER_KEY".to_string()
}

fn default_model() -> String {
    "prebuilt-read".to_string()
}

fn default_api_version() -> String {
    "2022-08-31".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_polls() -> u32 {
    60
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            api_version: default_api_version(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Image loader that delegates text recognition to Form Recognizer.
#[derive(Clone)]
pub struct FormRecognizerLoader {
    client: Client,
    analyze_url: String,
    poll_interval: Duration,
    max_polls: u32,
    retry: RetryPolicy,
}

impl fmt::Debug for FormRecognizerLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRecognizerLoader")
            .field("analyze_url", &self.analyze_url)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

impl FormRecognizerLoader {
    /// Build a loader; the key is passed explicitly, never read from globals.
    pub fn new(config: &OcrConfig, api_key: &str, retry: RetryPolicy) -> Result<Self, String> {
        if !(config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://")) {
            return Err("OCR endpoint must be an http(s) URL".to_string());
        }
        if api_key.trim().is_empty() {
            return Err(format!("missing OCR key (set {})", config.api_key_env));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            KEY_HEADER,
            HeaderValue::from_str(api_key.trim()).map_err(|_| "invalid OCR key".to_string())?,
        );
        let client = http::build_client(Duration::from_secs(config.timeout_secs.max(1)), headers)
            .map_err(|e| format!("failed to build OCR HTTP client: {e}"))?;

        let analyze_url = format!(
            "{}?api-version={}",
            http::join_url(
                &config.endpoint,
                &format!("formrecognizer/documentModels/{}:analyze", config.model)
            ),
            config.api_version
        );

        Ok(Self {
            client,
            analyze_url,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls.max(1),
            retry,
        })
    }

    fn submit(&self, source: &DocumentSource) -> Result<String, OcrCallError> {
        self.retry.run("ocr submit", |_| {
            let resp = self
                .client
                .post(&self.analyze_url)
                .header(CONTENT_TYPE, source.kind.mime_type())
                .body(source.bytes.clone())
                .send()
                .map_err(OcrCallError::from_transport)?;

            let status = resp.status();
            if status != StatusCode::ACCEPTED && !status.is_success() {
                return Err(OcrCallError::from_status(status, http::error_body(resp)));
            }

            resp.headers()
                .get("operation-location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| OcrCallError::permanent("response missing Operation-Location"))
        })
    }

    fn poll(&self, operation_url: &str) -> Result<AnalyzeResult, OcrCallError> {
        for poll in 1..=self.max_polls {
            let status: AnalyzeOperation = self.retry.run("ocr poll", |_| {
                let resp = self
                    .client
                    .get(operation_url)
                    .send()
                    .map_err(OcrCallError::from_transport)?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(OcrCallError::from_status(status, http::error_body(resp)));
                }
                resp.json()
                    .map_err(|e| OcrCallError::permanent(format!("malformed status: {e}")))
            })?;

            match status.status.as_str() {
                "succeeded" => {
                    return status
                        .analyze_result
                        .ok_or_else(|| OcrCallError::permanent("succeeded without analyzeResult"));
                }
                "failed" => {
                    return Err(OcrCallError::permanent("analysis failed"));
                }
                other => {
                    tracing::debug!(target: "loader", "OCR status {other} after poll {poll}");
                    thread::sleep(self.poll_interval);
                }
            }
        }

        Err(OcrCallError::permanent(format!(
            "analysis not finished after {} polls",
            self.max_polls
        )))
    }
}

impl DocumentLoader for FormRecognizerLoader {
    fn load(&self, source: &DocumentSource) -> Result<Vec<PageText>, DocumentParseError> {
        let operation_url = self
            .submit(source)
            .map_err(|e| DocumentParseError::extraction(&source.id, e.to_string()))?;
        let result = self
            .poll(&operation_url)
            .map_err(|e| DocumentParseError::extraction(&source.id, e.to_string()))?;
        Ok(result.into_pages())
    }
}

#[derive(Error, Debug)]
#[error("{message}")]
struct OcrCallError {
    message: String,
    retryable: bool,
}

impl OcrCallError {
    fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        Self {
            message: format!("OCR service returned {status}: {body}"),
            retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        Self {
            retryable: err.is_timeout() || err.is_connect(),
            message: format!("OCR request failed: {err}"),
        }
    }
}

impl Retryable for OcrCallError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedPage {
    page_number: usize,
    #[serde(default)]
    lines: Vec<AnalyzedLine>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedLine {
    content: String,
}

impl AnalyzeResult {
    fn into_pages(self) -> Vec<PageText> {
        if self.pages.is_empty() {
            return vec![PageText::new(1, self.content)];
        }
        self.pages
            .into_iter()
            .map(|page| {
                let text = page
                    .lines
                    .into_iter()
                    .map(|line| line.content)
                    .collect::<Vec<_>>()
                    .join("\n");
                PageText::new(page.page_number, text)
            })
            .collect()
    }
}
