use crate::config::{load_config, Config, ConfigError};
use crate::ingest::{IngestError, Ingestor};
use crate::notify::{CommandNotifier, Notifier, NullNotifier};
use crate::stats;
use crate::storage::duckdb::DuckDbStore;
use crate::storage::{RecordStore, StorageError};
use crate::tui::TuiError;
use crate::web::run_server;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("web server error: {0}")]
    Web(String),

    #[error("dashboard error: {0}")]
    Tui(#[from] TuiError),
}

async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, RunError> {
    info!(path = %config.db_path().display(), "initializing storage");
    let store = Arc::new(DuckDbStore::new(config.db_path())?);
    store.init_schema().await?;
    Ok(store)
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    if config.notify.enabled {
        Arc::new(CommandNotifier::new(config.notify.command.clone()))
    } else {
        Arc::new(NullNotifier)
    }
}

/// Continuous mode: ingestion loop plus (optionally) the web dashboard,
/// until Ctrl+C.
pub async fn watch(
    config_path: Option<PathBuf>,
    interval_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;
    let check_interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or(config.ingest.check_interval);

    run_watch(config, check_interval).await.map_err(|e| e.into())
}

async fn run_watch(config: Config, check_interval: Duration) -> Result<(), RunError> {
    let store = open_store(&config).await?;
    let notifier = build_notifier(&config);

    let mut ingestor = Ingestor::new(
        config.source.clone(),
        config.cursor_path(),
        store.clone(),
        notifier,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut web_handle = if config.web.enabled {
        let web_store = store.clone();
        let web_config = config.web.clone();
        let web_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            run_server(web_store, web_config, web_shutdown)
                .await
                .map_err(|e| RunError::Web(e.to_string()))
        }))
    } else {
        None
    };

    let stats_interval = config.ingest.stats_interval;
    let ingest_shutdown = shutdown_rx.clone();
    let ingest_handle = tokio::spawn(async move {
        ingestor
            .watch(check_interval, stats_interval, ingest_shutdown)
            .await;
    });

    info!("collector started, press Ctrl+C to shut down");

    let mut web_finished = false;
    if let Some(handle) = web_handle.as_mut() {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
            }
            result = handle => {
                web_finished = true;
                match result {
                    Ok(Ok(())) => info!("web server exited"),
                    Ok(Err(e)) => error!(error = %e, "web server error"),
                    Err(e) => error!(error = %e, "web server task join error"),
                }
            }
        }
    } else {
        let _ = signal::ctrl_c().await;
        info!("shutdown signal received");
    }

    let _ = shutdown_tx.send(true);

    match ingest_handle.await {
        Ok(()) => info!("ingestion stopped"),
        Err(e) => error!(error = %e, "ingestion task join error"),
    }

    if let Some(handle) = web_handle {
        if !web_finished {
            match handle.await {
                Ok(Ok(())) => info!("web server stopped"),
                Ok(Err(e)) => error!(error = %e, "web server error"),
                Err(e) => error!(error = %e, "web server task join error"),
            }
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// One-shot mode: ingest the whole source file from offset 0 and exit.
/// Failure notifications are suppressed; historical failures should not
/// re-alert on a backfill.
pub async fn parse_existing(
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;
    let store = open_store(&config).await?;

    let mut ingestor = Ingestor::new(
        config.source.clone(),
        config.cursor_path(),
        store,
        Arc::new(NullNotifier),
    );

    let count = ingestor.parse_existing().await?;
    println!("Parsed {} new entries", count);
    Ok(())
}

/// Print the current statistics snapshot and exit.
pub async fn stats(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;
    let store = open_store(&config).await?;

    let snapshot = stats::compute(store.as_ref(), Utc::now()).await?;
    let total = store.count().await?;

    let line = "=".repeat(60);
    println!("{}", line);
    println!("CRONWATCH STATISTICS");
    println!("{}", line);

    println!("\nLast 24 hours:");
    println!("  Total runs:   {}", snapshot.total_24h);
    println!("  Success rate: {:.1}%", snapshot.success_rate_24h);
    println!("  Failed runs:  {}", snapshot.failed_24h);

    println!("\nLast 7 days:");
    println!("  Total runs:   {}", snapshot.total_7d);
    println!("  Success rate: {:.1}%", snapshot.success_rate_7d);

    if snapshot.avg_interval_minutes > 0.0 {
        println!("\nAverage interval: {:.1} minutes", snapshot.avg_interval_minutes);
    }

    match &snapshot.last_failure {
        Some(failure) => {
            println!("\nLast failure:");
            println!("  Time:    {}", failure.timestamp);
            println!("  Exit:    {}", failure.exit_code);
            let message: String = failure.message.chars().take(80).collect();
            println!("  Message: {}", message);
        }
        None => println!("\nNo failures recorded"),
    }

    println!("\nDatabase: {} total entries", total);
    println!("{}", line);
    Ok(())
}

/// Interactive terminal dashboard.
pub async fn tui(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_deref())?;
    let store = open_store(&config).await?;

    crate::tui::run(store, Duration::from_secs(1)).await?;
    Ok(())
}
