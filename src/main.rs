use anyhow::{Context, Result, anyhow};
use clap::Parser;

use hsbc_assist::Settings;
use hsbc_assist::cli::commands::{ask, chunks, init, news};
use hsbc_assist::cli::{Cli, Commands};
use hsbc_assist::logging;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = &cli.command {
        let root = std::env::current_dir().context("cannot read current directory")?;
        return init::run_init(&root, *force);
    }

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!("failed to load configuration: {e}"))?;

    if cli.info {
        settings
            .logging
            .modules
            .entry("cli".to_string())
            .or_insert_with(|| "info".to_string());
        settings
            .logging
            .modules
            .entry("ingest".to_string())
            .or_insert_with(|| "info".to_string());
    }
    logging::init_with_config(&settings.logging);
    settings.validate().map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled before settings are loaded"),
        Commands::Config => init::run_config(&settings),
        Commands::Chunks {
            path,
            chunk_size,
            chunk_overlap,
            preview,
        } => chunks::run(&settings, &path, chunk_size, chunk_overlap, preview),
        Commands::Ask {
            question,
            docs,
            top_k,
            retrieve_only,
        } => ask::run(&settings, &question, &docs, top_k, retrieve_only),
        Commands::News {
            query,
            weeks,
            language,
            no_meta,
        } => news::run(&settings, &query, weeks, language, no_meta),
    }
}
