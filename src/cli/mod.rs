//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// lorebase - hybrid retrieval over a game knowledge base
#[derive(Parser, Debug)]
#[command(name = "lorebase", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Knowledge-base path (default: ~/.lorebase/kb.db)
    #[arg(long, global = true, env = "LOREBASE_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON (for agent integration)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the knowledge base
    Search(SearchArgs),

    /// Create the knowledge-base schema
    Init {
        /// Overwrite an existing knowledge base
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: clap_complete::Shell,
    },
}

/// Arguments for the search command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// The question to answer
    pub query: String,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Router strategy (plan, threshold, intent, parallel_expansion,
    /// entity_sentence, hop)
    #[arg(short, long, env = "LOREBASE_STRATEGY")]
    pub strategy: Option<String>,

    /// Show per-source ranks and scores
    #[arg(long)]
    pub debug: bool,
}
