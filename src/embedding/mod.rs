//! Text embedding providers.
//!
//! The [`EmbeddingProvider`] trait is the seam between the pipeline and a
//! remote embedding service. [`OpenAiEmbedder`] speaks the OpenAI and Azure
//! OpenAI `/embeddings` dialects.

mod openai;

pub use openai::{EmbeddingConfig, OpenAiEmbedder};

use reqwest::StatusCode;
use thiserror::Error;

use crate::http::Retryable;

/// Fixed-dimension vector representing one text.
pub type Embedding = Vec<f32>;

/// Errors from embedding provider calls.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("embedding provider rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("embedding request timed out")]
    Timeout,

    #[error("embedding transport error: {0}")]
    Transport(String),

    #[error("embedding provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("expected {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid embedding configuration: {0}")]
    Config(String),
}

impl EmbeddingError {
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

impl From<reqwest::Error> for EmbeddingError {
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

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Timeout | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Trait for embedding backends.
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Largest number of inputs accepted by one `embed_batch` call.
    fn max_batch_size(&self) -> usize {
        16
    }

    /// Embed a batch of texts, returning vectors in input order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no embedding returned".to_string()))
    }
}

/// Embed any number of texts in sequential batches of at most
/// `max_batch_size`, checking count and dimension of every result.
///
/// Fails as a whole if any batch fails.
pub fn embed_all<P>(provider: &P, inputs: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>
where
    P: EmbeddingProvider + ?Sized,
{
    let batch_size = provider.max_batch_size().max(1);
    let dimension = provider.dimension();
    let mut out = Vec::with_capacity(inputs.len());

    for (batch_no, batch) in inputs.chunks(batch_size).enumerate() {
        tracing::debug!(
            target: "embedding",
            "embedding batch {} ({} inputs)",
            batch_no + 1,
            batch.len()
        );
        let vectors = provider.embed_batch(batch)?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::MalformedResponse(format!(
                "provider returned {} embeddings for {} inputs",
                vectors.len(),
                batch.len()
            )));
        }
        for vector in &vectors {
            check_dimension(dimension, vector)?;
        }
        out.extend(vectors);
    }

    Ok(out)
}

/// Verify that `vector` has the expected dimension and only finite
/// components.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::MalformedResponse(format!(
            "embedding component {position} is not finite ({})",
            vector[position]
        )));
    }
    Ok(())
}
