//! Command-line argument parsing for ragserve
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::rag::QueryRequest;

/// ragserve - answer questions from internal documents
#[derive(Parser, Debug)]
#[command(name = "ragserve")]
#[command(version)]
#[command(about = "Answer questions from internal documents with a local model", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.ragserve/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the Ollama base URL
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    /// Override the Ollama model
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Override the search service base URL
    #[arg(long, global = true)]
    pub search_url: Option<String>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress everything except the answer)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// The question
        #[arg(value_name = "QUERY")]
        query: String,

        #[command(flatten)]
        options: QueryOptions,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive session
    Repl {
        #[command(flatten)]
        options: QueryOptions,
    },

    /// Check the generation backend and search provider
    Health,

    /// Display current configuration
    Config,
}

/// Per-query overrides of configured defaults
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct QueryOptions {
    /// Documents to retrieve (1-10)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Relevance floor (0.0-1.0)
    #[arg(long)]
    pub min_relevance: Option<f64>,

    /// Sampling temperature (0.0-2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Caller identity, recorded in logs
    #[arg(short, long)]
    pub user: Option<String>,
}

impl QueryOptions {
    /// Build a request from configured defaults plus these overrides
    pub fn request(&self, query: &str, config: &Config) -> QueryRequest {
        let mut request = QueryRequest::new(query)
            .with_top_k(self.top_k.unwrap_or(config.retrieval.top_k))
            .with_min_relevance(self.min_relevance.unwrap_or(config.retrieval.min_relevance))
            .with_sampling(
                self.temperature.unwrap_or(config.generation.temperature),
                self.max_tokens.unwrap_or(config.generation.max_tokens),
            );
        if let Some(user) = &self.user {
            request = request.with_user(user.clone());
        }
        request
    }
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Apply command-line endpoint overrides to a loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.ollama_url {
            config.ollama.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.ollama.model = model.clone();
        }
        if let Some(url) = &self.search_url {
            config.search.base_url = url.clone();
        }
    }
}

impl Verbosity {
    /// Default tracing filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "ragserve=error",
            Verbosity::Normal => "ragserve=warn",
            Verbosity::Verbose => "ragserve=info",
            Verbosity::VeryVerbose => "ragserve=debug",
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show timings and sources
    pub fn show_details(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
