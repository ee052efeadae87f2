//! CLI argument parsing for the match daemon.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Match Index Daemon
///
/// Persistent nearest-neighbor index over entity embeddings.
#[derive(Parser, Debug)]
#[command(name = "match-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/match-index/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override snapshot path
    #[arg(long, global = true)]
    pub snapshot: Option<String>,

    /// Override the JSON-lines records file used for rebuilds
    #[arg(long, global = true)]
    pub records: Option<String>,

    /// Override embedding dimension
    #[arg(long, global = true)]
    pub dimension: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Index commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show index statistics
    Status,

    /// Insert or replace the vector for an id
    Upsert {
        /// Record id
        #[arg(long, allow_negative_numbers = true)]
        id: i64,

        /// Comma-separated vector components
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        vector: Vec<f32>,
    },

    /// Remove the vector for an id
    Remove {
        /// Record id
        #[arg(long, allow_negative_numbers = true)]
        id: i64,
    },

    /// Find the nearest neighbors of a query vector
    Search {
        /// Comma-separated query components
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        vector: Vec<f32>,

        /// Number of results (defaults to default_top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Rebuild the index from the records file
    Rebuild,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("entity embeddings"));
    }

    #[test]
    fn test_cli_status() {
        let cli = Cli::parse_from(["match-daemon", "status"]);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_upsert() {
        let cli = Cli::parse_from([
            "match-daemon",
            "upsert",
            "--id",
            "42",
            "--vector",
            "0.5,-0.25,1",
        ]);
        match cli.command {
            Commands::Upsert { id, vector } => {
                assert_eq!(id, 42);
                assert_eq!(vector, vec![0.5, -0.25, 1.0]);
            }
            _ => panic!("Expected Upsert command"),
        }
    }

    #[test]
    fn test_cli_negative_id() {
        let cli = Cli::parse_from(["match-daemon", "remove", "--id", "-7"]);
        match cli.command {
            Commands::Remove { id } => assert_eq!(id, -7),
            _ => panic!("Expected Remove command"),
        }
    }

    #[test]
    fn test_cli_search_with_k() {
        let cli = Cli::parse_from(["match-daemon", "search", "--vector", "1,0", "-k", "3"]);
        match cli.command {
            Commands::Search { vector, k } => {
                assert_eq!(vector, vec![1.0, 0.0]);
                assert_eq!(k, Some(3));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_default_k() {
        let cli = Cli::parse_from(["match-daemon", "search", "--vector", "1,0"]);
        match cli.command {
            Commands::Search { k, .. } => assert_eq!(k, None),
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_global_overrides() {
        let cli = Cli::parse_from([
            "match-daemon",
            "rebuild",
            "--records",
            "/tmp/records.jsonl",
            "--snapshot",
            "/tmp/vectors.index",
            "--dimension",
            "8",
            "--log-level",
            "debug",
        ]);
        assert!(matches!(cli.command, Commands::Rebuild));
        assert_eq!(cli.records, Some("/tmp/records.jsonl".to_string()));
        assert_eq!(cli.snapshot, Some("/tmp/vectors.index".to_string()));
        assert_eq!(cli.dimension, Some(8));
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["match-daemon", "--config", "/path/to/config.toml", "status"]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
    }
}
