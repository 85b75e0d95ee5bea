//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lensrag",
    version,
    about = "Chunk, index and search documents for retrieval-augmented answers",
    long_about = "lensrag splits document text into token-bounded chunks, embeds them into a \
                  per-document vector collection and retrieves the most relevant chunks with \
                  semantic, hybrid (BM25 + semantic) or reranked search."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/lensrag/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a text file into chunks (pages separated by form feeds)
    Chunk {
        /// UTF-8 text file
        file: PathBuf,

        /// Chunking strategy (size_based, paragraph_based)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Index a text file in memory and search it
    Query {
        /// UTF-8 text file
        file: PathBuf,

        /// Question to search for
        question: String,

        /// Retrieval strategy (semantic, hybrid, rerank)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Chunking strategy used for indexing
        #[arg(long)]
        chunking: Option<String>,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from([
            "lensrag",
            "query",
            "policy.txt",
            "Wie hoch ist die Selbstbeteiligung?",
            "--strategy",
            "hybrid",
            "-l",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                strategy, limit, ..
            } => {
                assert_eq!(strategy.as_deref(), Some("hybrid"));
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
