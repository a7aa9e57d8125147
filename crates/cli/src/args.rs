use auditor_core::config::FailurePolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deck-auditor")]
#[command(about = "Compliance audit of slide decks against reference guidelines", long_about = None)]
pub struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit every slide of one or more decks (files or directories)
    Audit {
        #[arg(required = true)]
        decks: Vec<PathBuf>,
        /// Output a JSON envelope with per-deck summaries
        #[arg(long)]
        json: bool,
        /// What to do with slides whose audit failed: omit|mark
        #[arg(long)]
        failure_policy: Option<FailurePolicy>,
        /// Slides audited at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Ask a free-text question about a deck
    Ask { deck: PathBuf, question: String },
    /// Print the extracted slide content of a deck without calling any model
    Extract {
        deck: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the knowledge store directly
    Search {
        query: String,
        /// Number of passages
        #[arg(short = 'k', long, default_value_t = 4)]
        top_k: usize,
    },
    /// Populate the knowledge store from the guideline set
    Ingest {
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
}
