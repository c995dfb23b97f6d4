// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Indexer Service
//!
//! Entry point for the `vault-indexer` binary. Parses CLI arguments,
//! initializes logging and metrics, and serves the indexing API.
//!
//! The binary supports three subcommands:
//!
//! - `run`: serve the HTTP API and the metrics endpoint
//! - `fetch`: fetch and normalize one vault, print it, persist nothing
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use vault_indexer::config::IndexerConfig;
use vault_indexer::{normalize, JsonRpcClient, VaultDocument, VaultFetcher, VaultIndexer, VaultStore};

use cli::{Commands, IndexerCli};
use logging::LogFormat;
use metrics::{IndexerMetrics, InstrumentedReader};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = IndexerCli::parse();

    match cli.command {
        Commands::Run(args) => run_service(args).await,
        Commands::Fetch(args) => fetch_vault(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the indexer: store, RPC client, API server and metrics endpoint.
async fn run_service(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "vault_indexer=info,vault_indexer_node=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let config = load_config(args.config.as_deref())?;
    let registry = config
        .registry()
        .context("invalid endpoint registry in configuration")?;

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        endpoints = registry.len(),
        "starting vault-indexer"
    );
    for endpoint in registry.entries() {
        tracing::info!(suffix = %endpoint.suffix, url = %endpoint.url, "whitelisted factory");
    }

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let store = VaultStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(
        path = %db_path.display(),
        collections = store.collections().len(),
        "database opened"
    );

    // --- Metrics ---
    let indexer_metrics = Arc::new(IndexerMetrics::new().context("failed to register metrics")?);

    // --- RPC client ---
    let client = JsonRpcClient::new(config.rpc_timeout()).context("failed to build RPC client")?;
    let reader = Arc::new(InstrumentedReader::new(client, &indexer_metrics));

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        indexer: Arc::new(VaultIndexer::new(registry, reader, store.clone())),
        metrics: Arc::clone(&indexer_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&indexer_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    store.flush().context("failed to flush database")?;
    tracing::info!("vault-indexer stopped");
    Ok(())
}

/// Fetches one vault and prints its normalized form as JSON on stdout.
async fn fetch_vault(args: cli::FetchArgs) -> Result<()> {
    logging::init_logging("vault_indexer=warn", LogFormat::Pretty);

    let config = load_config(args.config.as_deref())?;
    let registry = config
        .registry()
        .context("invalid endpoint registry in configuration")?;
    let resolved = registry.resolve(&args.vault)?;

    let client = JsonRpcClient::new(config.rpc_timeout()).context("failed to build RPC client")?;
    let fetcher = VaultFetcher::new(Arc::new(client));
    let raw = fetcher
        .fetch(&args.vault, resolved.endpoint)
        .await
        .with_context(|| format!("failed to fetch {} from {}", args.vault, resolved.endpoint))?;

    let document = VaultDocument {
        id: args.vault.clone(),
        vault: normalize(raw),
    };
    tracing::info!(collection = resolved.suffix, "vault fetched");
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Reads the configuration file when given, otherwise the built-in defaults.
fn load_config(path: Option<&Path>) -> Result<IndexerConfig> {
    match path {
        Some(path) => IndexerConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(IndexerConfig::default()),
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("vault-indexer {}", env!("CARGO_PKG_VERSION"));
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
