//! certkeep pruning service
//!
//! Standalone retention service for certificate issuance records: consumes
//! change triggers and periodic resyncs, and deletes the oldest issuance
//! records beyond each certificate's revision history limit.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;

use common::config::Configuration;
use common::store::memory::InMemoryStore;
use pruner::worker::PruneWorker;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "certkeep.toml")]
    config: String,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    // Load configuration
    let config = if Path::new(&args.config).exists() {
        Configuration::load_from_path(Path::new(&args.config))
            .context("Failed to load configuration")?
    } else {
        tracing::info!("Configuration file not found, using defaults");
        Configuration::load().context("Failed to load configuration")?
    };
    config.validate().context("Invalid configuration")?;

    // Check if the pruner is enabled
    if !config.pruner.enabled {
        tracing::info!("Pruner is disabled in configuration (pruner.enabled = false)");
        tracing::info!(
            "Set CERTKEEP__PRUNER__ENABLED=true or enable in config file to run the pruner"
        );
        return Ok(());
    }

    tracing::info!("Starting certkeep pruning service");

    // The in-memory store is the reference backend; deployments against a
    // remote resource API plug their client in through the RecordStore
    // trait instead.
    let store = Arc::new(InMemoryStore::new());

    let (worker, trigger) = PruneWorker::new(store, config.pruner.clone());
    let metrics = worker.metrics();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    tracing::info!("Pruning service running, waiting for shutdown signal");
    wait_for_shutdown_signal().await?;

    tracing::info!("Received shutdown signal, stopping pruning service");

    let _ = shutdown_tx.send(true);
    worker_handle.await.context("Prune worker task panicked")?;

    // The trigger handle stays alive until here so the worker never
    // mistakes a closed channel for shutdown.
    drop(trigger);

    metrics.summary().log();

    tracing::info!("Pruning service stopped");

    Ok(())
}
