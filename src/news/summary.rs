//! Article enrichment and meta summaries.
//!
//! Each article body is chunked and "stuffed" into a single prompt together
//! with its headline. The numbered results feed a second prompt that ranks
//! the key points across all articles.

use serde::{Deserialize, Serialize};

use super::NewsError;
use crate::documents::{ChunkingConfig, chunk_text};
use crate::llm::{CompletionRequest, LlmProvider};

const ENRICH_PROMPT: &str = "Provided a news article headline and the news article body text in \
html format, enrich the headline with the body text and return the enriched headline, which \
should be no more than three sentences long. The enriched headline should contain all the key \
information from the body text.";

const META_PROMPT: &str = "Provided several enriched news article headlines, produce a meta \
summary of the articles. Only use information from the text given, and summarise the key \
information from the articles in a numbered list ordered by their level of importance.";

/// What to do when one article cannot be summarised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFailurePolicy {
    /// Keep going and put an error line in place of the article.
    #[default]
    BestEffort,
    /// Abort the whole batch on the first failure.
    FailFast,
}

/// Summarization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub failure_policy: SummaryFailurePolicy,

    /// Token limit for each enriched headline.
    #[serde(default = "default_article_max_tokens")]
    pub article_max_tokens: usize,

    /// Token limit for the meta summary.
    #[serde(default = "default_meta_max_tokens")]
    pub meta_max_tokens: usize,
}

fn default_article_max_tokens() -> usize {
    256
}

fn default_meta_max_tokens() -> usize {
    512
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            failure_policy: SummaryFailurePolicy::default(),
            article_max_tokens: default_article_max_tokens(),
            meta_max_tokens: default_meta_max_tokens(),
        }
    }
}

/// A headline with its story body, if one was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub headline: String,
    pub body: Option<String>,
}

impl Article {
    pub fn new(headline: impl Into<String>, body: Option<String>) -> Self {
        Self {
            headline: headline.into(),
            body,
        }
    }
}

pub struct Summarizer<'a> {
    llm: &'a dyn LlmProvider,
    chunking: ChunkingConfig,
    config: NewsConfig,
}

impl<'a> Summarizer<'a> {
    pub fn new(llm: &'a dyn LlmProvider, chunking: ChunkingConfig, config: NewsConfig) -> Self {
        Self {
            llm,
            chunking,
            config,
        }
    }

    /// Enrich every headline with its body and number the results
    /// `Article N`.
    ///
    /// Articles without a body become `Article: N: No article text found`.
    /// Failed calls become an error line under
    /// [`SummaryFailurePolicy::BestEffort`] and abort the batch under
    /// [`SummaryFailurePolicy::FailFast`].
    pub fn summarise_articles(&self, articles: &[Article]) -> Result<String, NewsError> {
        let mut out = String::new();

        for (idx, article) in articles.iter().enumerate() {
            let number = idx + 1;
            let Some(body) = article.body.as_deref().filter(|b| !b.trim().is_empty()) else {
                out.push_str(&format!("Article: {number}: No article text found\n\n"));
                continue;
            };

            let text = format!("headline: ```{}```\narticle body: ```{}```", article.headline, body);
            let prompt = stuff_prompt(ENRICH_PROMPT, &text, &self.chunking);
            let request = CompletionRequest::new(&prompt, self.config.article_max_tokens);

            match self.llm.complete(&request) {
                Ok(summary) => {
                    out.push_str(&format!("Article {number} {}\n\n", escape_dollars(summary.trim())));
                }
                Err(err) => match self.config.failure_policy {
                    SummaryFailurePolicy::FailFast => {
                        return Err(NewsError::Summary {
                            article: number,
                            source: err,
                        });
                    }
                    SummaryFailurePolicy::BestEffort => {
                        tracing::warn!(target: "news", "article {number} not summarised: {err}");
                        out.push_str(&format!(
                            "Article: {number}: Error in summarising article: {err}\n\n"
                        ));
                    }
                },
            }
        }

        Ok(out)
    }

    /// Ranked, numbered summary of enriched headlines.
    pub fn produce_meta_summary(&self, text: &str) -> Result<String, NewsError> {
        let prompt = stuff_prompt(META_PROMPT, text, &self.chunking);
        let request = CompletionRequest::new(&prompt, self.config.meta_max_tokens);
        let summary = self.llm.complete(&request)?;
        Ok(escape_dollars(summary.trim()))
    }
}

/// Chunk `text` and place every chunk into one prompt after `instruction`.
fn stuff_prompt(instruction: &str, text: &str, chunking: &ChunkingConfig) -> String {
    let stuffed = chunk_text(text, chunking)
        .into_iter()
        .map(|c| c.content)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{instruction}\n\ntext: ```{stuffed}```")
}

/// Escape `$` so downstream markdown renderers do not start math mode.
pub fn escape_dollars(text: &str) -> String {
    text.replace('$', "\\$")
}
