//! News command: query headlines, enrich them, then meta-summarise.

use anyhow::{Context, Result};

use crate::config::{self, Settings};
use crate::llm::OpenAiChat;
use crate::news::{Article, RefinitivClient, Summarizer};

pub fn run(
    settings: &Settings,
    query: &str,
    weeks: Option<u32>,
    language: Option<String>,
    no_meta: bool,
) -> Result<()> {
    let mut rkd = settings.refinitiv.clone();
    if let Some(weeks) = weeks {
        rkd.weeks_prior = weeks;
    }
    if let Some(language) = language {
        rkd.language = language;
    }

    let password = config::api_key(&rkd.password_env).map_err(anyhow::Error::msg)?;
    let mut client = RefinitivClient::new(&rkd, &password, settings.retry.clone())?;
    client.authenticate()?;

    let headlines = client.headlines(query)?;
    if headlines.is_empty() {
        println!("No usable headlines for {query:?}");
        return Ok(());
    }

    let mut articles = Vec::with_capacity(headlines.len());
    for headline in &headlines {
        let body = client
            .story(&headline.id)
            .with_context(|| format!("failed to fetch story {}", headline.id))?;
        articles.push(Article::new(headline.headline.clone(), body));
    }

    let llm_key = config::api_key(&settings.llm.api_key_env).map_err(anyhow::Error::msg)?;
    let llm = OpenAiChat::new(&settings.llm, &llm_key, settings.retry.clone())?;
    let summarizer = Summarizer::new(&llm, settings.chunking.clone(), settings.news.clone());

    let enriched = summarizer.summarise_articles(&articles)?;
    println!("{}", enriched.trim_end());

    if !no_meta {
        let meta = summarizer.produce_meta_summary(&enriched)?;
        println!("\nMeta summary:\n{meta}");
    }
    Ok(())
}
