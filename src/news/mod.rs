//! Refinitiv news retrieval and LLM summarization.
//!
//! [`RefinitivClient`] authenticates against the RKD API, runs free-text
//! headline queries and fetches story bodies. [`Summarizer`] turns those
//! stories into enriched headlines and a ranked meta summary.

pub mod refinitiv;
pub mod summary;

pub use refinitiv::{Headline, RefinitivClient, RefinitivConfig};
pub use summary::{Article, NewsConfig, SummaryFailurePolicy, Summarizer};

use reqwest::StatusCode;
use thiserror::Error;

use crate::http::Retryable;
use crate::llm::LlmCallError;

/// Errors from the news API or from summarization.
#[derive(Error, Debug)]
pub enum NewsError {
    #[error("RKD authentication failed: {0}")]
    Auth(String),

    #[error("no RKD token; call authenticate first")]
    NotAuthenticated,

    #[error("RKD request timed out")]
    Timeout,

    #[error("RKD transport error: {0}")]
    Transport(String),

    #[error("RKD returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed RKD response: {0}")]
    MalformedResponse(String),

    #[error("no headlines found for {query:?}")]
    NoResults { query: String },

    #[error("failed to summarise article {article}: {source}")]
    Summary {
        article: usize,
        #[source]
        source: LlmCallError,
    },

    #[error(transparent)]
    Llm(#[from] LlmCallError),

    #[error("invalid news configuration: {0}")]
    Config(String),
}

impl NewsError {
    pub(crate) fn from_status(status: StatusCode, body: String) -> Self {
        Self::Status {
            status: status.as_u16(),
            body,
        }
    }
}

impl From<reqwest::Error> for NewsError {
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

impl Retryable for NewsError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
