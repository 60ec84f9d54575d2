//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Document QA and news summaries for the HSBC assistant
#[derive(Parser, Debug)]
#[command(
    name = "hsbc-assist",
    version = env!("CARGO_PKG_VERSION"),
    about = "Retrieval-augmented document QA and news summaries",
    long_about = "Answer questions from HSBC documents with retrieval-augmented generation, \
and summarise Refinitiv news.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ hsbc-assist init\n  $ hsbc-assist chunks ./documents/faq.pdf\n  $ hsbc-assist ask \"How do I open an account?\" --docs ./documents\n  $ hsbc-assist news HSBC --weeks 2"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show detailed progress logs
    #[arg(long, global = true)]
    pub info: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .hsbc-assist directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings after file and env layering")]
    Config,

    /// Split documents into chunks without calling any API
    #[command(
        about = "Show how documents are chunked",
        after_help = "Examples:\n  hsbc-assist chunks faq.pdf\n  hsbc-assist chunks notes.txt --chunk-size 500 --chunk-overlap 50"
    )]
    Chunks {
        /// Document to load
        path: PathBuf,

        /// Override chunking.chunk_size
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override chunking.chunk_overlap
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Characters of each chunk to print
        #[arg(long, default_value = "120")]
        preview: usize,
    },

    /// Ask a question about a set of documents
    #[command(
        about = "Answer a question from documents",
        after_help = "Examples:\n  hsbc-assist ask \"What are the branch opening hours?\" --docs ./documents\n  hsbc-assist ask \"Card lost\" --docs faq.pdf --retrieve-only"
    )]
    Ask {
        /// Question to answer
        question: String,

        /// Files or directories to ingest (defaults to settings.documents_dir)
        #[arg(long = "docs", value_name = "PATH")]
        docs: Vec<PathBuf>,

        /// Override retrieval.top_k
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the retrieved chunks instead of calling the LLM
        #[arg(long)]
        retrieve_only: bool,
    },

    /// Summarise recent news for a query
    #[command(
        about = "Summarise Refinitiv headlines",
        after_help = "Examples:\n  hsbc-assist news HSBC\n  hsbc-assist news \"Hang Seng\" --weeks 4 --language ZH"
    )]
    News {
        /// Free-text query
        query: String,

        /// Override refinitiv.weeks_prior
        #[arg(long)]
        weeks: Option<u32>,

        /// Override refinitiv.language
        #[arg(long)]
        language: Option<String>,

        /// Print enriched headlines without a meta summary
        #[arg(long)]
        no_meta: bool,
    },
}
