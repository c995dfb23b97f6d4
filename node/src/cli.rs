//! # CLI Interface
//!
//! Defines the command-line argument structure for `vault-indexer` using
//! `clap` derive. Supports three subcommands: `run`, `fetch`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vault_indexer::config::{DEFAULT_HTTP_PORT, DEFAULT_METRICS_PORT};

/// SudoStake vault indexer.
///
/// Reads vault state from NEAR RPC nodes, classifies each vault's lending
/// lifecycle, and serves list queries over the indexed copy.
#[derive(Parser, Debug)]
#[command(
    name = "vault-indexer",
    about = "SudoStake vault state indexer",
    version,
    propagate_version = true
)]
pub struct IndexerCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the indexing API and the metrics endpoint.
    Run(RunArgs),
    /// Fetch and normalize a single vault, print it as JSON, and exit.
    /// Nothing is written to the store.
    Fetch(FetchArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the configuration file (TOML).
    ///
    /// When omitted, the built-in endpoint allow-list is used.
    #[arg(long, short = 'c', env = "VAULT_INDEXER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the document store. Created on first run.
    #[arg(long, short = 'd', env = "VAULT_INDEXER_DATA_DIR", default_value = "./vault-data")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[arg(long, env = "VAULT_INDEXER_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "VAULT_INDEXER_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "VAULT_INDEXER_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `fetch` subcommand.
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Full vault account id, e.g. `vault-0.sudostake.near`.
    pub vault: String,

    /// Path to the configuration file (TOML).
    #[arg(long, short = 'c', env = "VAULT_INDEXER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        IndexerCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = IndexerCli::try_parse_from(["vault-indexer", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.port, DEFAULT_HTTP_PORT);
                assert_eq!(args.metrics_port, DEFAULT_METRICS_PORT);
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn fetch_takes_vault_positional() {
        let cli =
            IndexerCli::try_parse_from(["vault-indexer", "fetch", "vault-0.sudostake.near"]).unwrap();
        match cli.command {
            Commands::Fetch(args) => assert_eq!(args.vault, "vault-0.sudostake.near"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
