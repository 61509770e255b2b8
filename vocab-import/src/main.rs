//! vocab-import - Vocabulary feed importer
//!
//! Picks the newest JSON feed file from the configured source folder (or
//! downloads it from the `[sftp]` server) and imports its elements into the
//! vocabulary database. Runs once, or every `--interval` seconds until
//! interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vocab_common::config::{resolve_config_path, resolve_database_path, ImportConfig};
use vocab_common::db::init_database;
use vocab_common::events::EventBus;
use vocab_import::source::{DocumentSource, LocalDirectorySource, SftpSource};
use vocab_import::store::SqliteRecordStore;
use vocab_import::{ImportJob, ImportReport};

/// Command-line arguments for vocab-import
#[derive(Parser, Debug)]
#[command(name = "vocab-import")]
#[command(about = "Import a JSON feed into a vocabulary")]
#[command(version)]
struct Args {
    /// Configuration file (falls back to VOCAB_IMPORT_CONFIG, then the user and system config dirs)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vocabulary database file (falls back to the config file, then VOCAB_IMPORT_DATABASE)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(long, env = "VOCAB_IMPORT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Repeat the import every SECS seconds
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Match and build records without saving them or deleting the source
    #[arg(long)]
    dry_run: bool,

    /// Print each run report as JSON on stdout
    #[arg(long)]
    report_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let config = ImportConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vocab_import={level},vocab_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vocab-import v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", config_path.display());

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize vocabulary database")?;
    let store = SqliteRecordStore::new(pool);

    let bus = EventBus::new(256);
    spawn_event_logger(&bus);

    let Some(secs) = args.interval else {
        let report = run_once(&store, &config, &bus, &args).await?;
        if let Some(report) = report {
            if !report.fully_persisted() {
                bail!("{} record(s) could not be saved", report.failed);
            }
        }
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    info!("Importing every {} s, press Ctrl+C to stop", secs.max(1));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Pick up mapping changes between runs
                let config = match ImportConfig::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Configuration reload failed, skipping run: {}", e);
                        continue;
                    }
                };
                if let Err(e) = run_once(&store, &config, &bus, &args).await {
                    error!("Import run failed: {:#}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    store.pool().close().await;
    info!("vocab-import stopped");
    Ok(())
}

async fn run_once(
    store: &SqliteRecordStore,
    config: &ImportConfig,
    bus: &EventBus,
    args: &Args,
) -> Result<Option<ImportReport>> {
    let source: Box<dyn DocumentSource> = match config.active_sftp() {
        Some(sftp) => {
            debug!(host = %sftp.hostname, folder = %sftp.remote_folder.display(), "Using SFTP source");
            Box::new(SftpSource::new(sftp.clone(), &config.source_folder))
        }
        None => Box::new(LocalDirectorySource::new(&config.source_folder)),
    };
    let report = ImportJob::new(store, source.as_ref(), &config.vocabulary)
        .with_events(bus)
        .dry_run(args.dry_run)
        .run()
        .await?;

    if let Some(report) = &report {
        for issue in &report.issues {
            debug!(element = ?issue.element, code = %issue.code, "{}", issue.message);
        }
        if args.report_json {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        if !report.fully_persisted() {
            warn!("{} of {} elements not saved", report.failed, report.total_elements);
        }
    }

    Ok(report)
}

/// Mirror import events into the log at debug level
fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(target: "vocab_import::events", "{}", json),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event logger lagged, {} events dropped", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
