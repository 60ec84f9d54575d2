//! Grounded question answering over retrieved chunks.

use thiserror::Error;

use crate::llm::{CompletionRequest, LlmCallError, LlmProvider};
use crate::vector::{DocumentStore, RowId};

/// A retrieved row id has no chunk in the document store.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("row {row_id} is in the vector index but missing from the document store")]
pub struct StoreInconsistencyError {
    pub row_id: RowId,
}

/// Failure while answering a question.
#[derive(Error, Debug)]
pub enum AnswerError {
    #[error(transparent)]
    Store(#[from] StoreInconsistencyError),

    #[error(transparent)]
    Llm(#[from] LlmCallError),
}

const SYSTEM_PROMPT: &str = "You are a customer service assistant for HSBC. \
Answer only from the supplied context and never invent facts.";

/// Builds the context block and prompt, then makes one LLM call.
#[derive(Debug, Clone)]
pub struct Answerer {
    max_tokens: usize,
    temperature: f32,
}

impl Default for Answerer {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

impl Answerer {
    pub fn new(max_tokens: usize, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }

    /// Answer `question` from the chunks stored under `row_ids`, in order.
    ///
    /// Returns the model output with surrounding whitespace trimmed.
    ///
    /// # Errors
    /// * [`AnswerError::Store`] if a row id has no chunk; the LLM is not called
    /// * [`AnswerError::Llm`] with [`LlmCallError::EmptyCompletion`] when the
    ///   completion is blank after trimming
    /// * [`AnswerError::Llm`] for any provider failure
    pub fn answer(
        &self,
        question: &str,
        row_ids: &[RowId],
        store: &DocumentStore,
        llm: &dyn LlmProvider,
    ) -> Result<String, AnswerError> {
        let context = build_context(row_ids, store)?;
        let prompt = build_prompt(question, &context);
        tracing::debug!(
            target: "qa",
            "answering with {} chunk(s), {} prompt chars",
            row_ids.len(),
            prompt.len()
        );

        let request = CompletionRequest::new(&prompt, self.max_tokens)
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.temperature);
        let completion = llm.complete(&request)?;
        let answer = completion.trim();
        if answer.is_empty() {
            return Err(LlmCallError::EmptyCompletion.into());
        }
        Ok(answer.to_string())
    }
}

/// Join the chunk texts for `row_ids`, each under a source header, separated
/// by blank lines.
pub fn build_context(
    row_ids: &[RowId],
    store: &DocumentStore,
) -> Result<String, StoreInconsistencyError> {
    let mut sections = Vec::with_capacity(row_ids.len());
    for &row_id in row_ids {
        let chunk = store
            .get(row_id)
            .ok_or(StoreInconsistencyError { row_id })?;
        sections.push(format!(
            "[Source: {} #{}]\n{}",
            chunk.source_id,
            chunk.sequence_index,
            chunk.text.trim()
        ));
    }
    Ok(sections.join("\n\n"))
}

/// Prompt restricting the model to `context`.
pub fn build_prompt(question: &str, context: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Use only the following context to answer the question. \
If the answer is not contained in the context, say that you don't know.\n\n",
    );
    prompt.push_str("Context:\n");
    if context.is_empty() {
        prompt.push_str("(no context)");
    } else {
        prompt.push_str(context);
    }
    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(question.trim());
    prompt.push_str("\n\nAnswer:");
    prompt
}
