//! # Tagscope CLI
//!
//! Command-line interface for the Tagscope image tag search.
//!
//! ## Commands
//!
//! - `tagscope import <file>` - Load tagged items into the tag database
//! - `tagscope query <query>` - Find items matching a tag query
//! - `tagscope parse <query>` - Show how a query is read
//! - `tagscope tags` - List tags in scope with usage counts
//! - `tagscope status` - Show database statistics
//!
//! ## Example Usage
//!
//! ```bash
//! # Load the output of an external tagger
//! tagscope import tags.json
//!
//! # Cats that are not outdoors, under ~/Pictures
//! tagscope query "cat AND NOT outdoors" -s ~/Pictures
//!
//! # Tag suggestions while typing "ca"
//! tagscope tags -p ca -s ~/Pictures
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tagscope - Boolean tag search over image folders
#[derive(Parser)]
#[command(name = "tagscope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "TAGSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load tagged items from a JSON file ("-" for stdin)
    Import {
        /// JSON array of {"id", "location", "tags"} records
        file: PathBuf,

        /// Remove every stored item first
        #[arg(long)]
        replace: bool,
    },

    /// Find items matching a tag query
    #[command(alias = "q")]
    Query {
        /// Query, e.g. "cat AND (dog OR bird) AND NOT outdoors"
        query: String,

        /// Directory to search in (repeatable; defaults to [scope] directories)
        #[arg(short, long = "scope")]
        scope: Vec<String>,

        /// Maximum number of results to show (0 = all)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Parse a query and print its canonical form
    Parse {
        /// Query to parse
        query: String,
    },

    /// List tags used in scope, most common first
    Tags {
        /// Only tags starting with this text
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Directory to search in (repeatable; defaults to [scope] directories)
        #[arg(short, long = "scope")]
        scope: Vec<String>,

        /// Maximum number of tags to show (0 = all)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show database status and statistics
    Status,
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => tagscope_core::Config::load_from(path)?,
        None => tagscope_core::Config::load()?,
    };
    config.validate()?;

    // Setup logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.general.log_level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    // Execute command
    match cli.command {
        Commands::Import { file, replace } => commands::import::run(config, &file, replace),
        Commands::Query {
            query,
            scope,
            limit,
            output,
        } => commands::query::run(config, &query, &scope, limit, output),
        Commands::Parse { query } => commands::parse::run(config, &query),
        Commands::Tags {
            prefix,
            scope,
            limit,
        } => commands::tags::run(config, &prefix, &scope, limit),
        Commands::Status => commands::status::run(config),
    }
}
