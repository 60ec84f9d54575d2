//! Ask command: ingest documents, then answer one question.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::pipeline::RagPipeline;

pub fn run(
    settings: &Settings,
    question: &str,
    docs: &[PathBuf],
    top_k: Option<usize>,
    retrieve_only: bool,
) -> Result<()> {
    let mut pipeline =
        RagPipeline::from_settings(settings).context("failed to set up the QA pipeline")?;
    let top_k = top_k.unwrap_or(settings.retrieval.top_k);
    pipeline = pipeline.with_top_k(top_k);

    let docs = if docs.is_empty() {
        vec![settings.documents_dir.clone()]
    } else {
        docs.to_vec()
    };

    for path in &docs {
        if !path.exists() {
            bail!("{} does not exist", path.display());
        }
        let report = pipeline
            .ingest_path(path)
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        tracing::info!(
            target: "cli",
            "{}: {} document(s), {} chunk(s)",
            path.display(),
            report.documents,
            report.chunks
        );
        for (source, reason) in &report.failed {
            eprintln!("warning: skipped {source}: {reason}");
        }
    }

    if pipeline.is_empty() {
        bail!("no text was indexed from {} path(s)", docs.len());
    }

    if retrieve_only {
        let rows = pipeline.query(question, top_k)?;
        let hits = pipeline.snapshot(&rows);
        for (rank, row) in rows.iter().enumerate() {
            if let Some(chunk) = hits.get(*row) {
                println!(
                    "{}. row {row} [{} #{}]\n{}\n",
                    rank + 1,
                    chunk.source_id,
                    chunk.sequence_index,
                    chunk.preview(400).trim()
                );
            }
        }
        return Ok(());
    }

    let answer = pipeline.ask(question)?;
    println!("{answer}");
    Ok(())
}
