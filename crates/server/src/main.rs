use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use stowage_blob::BlobStore;
use stowage_service::{FileService, FileServiceConfig, Reconciler, ReconcilerConfig};

use stowage_server::api::{self, AppState};
use stowage_server::config::StowageConfig;
use stowage_server::metadata_factory::create_metadata_store;

#[derive(Parser, Debug)]
#[command(name = "stowage-server", about = "File store with consistent metadata", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowage=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StowageConfig::from_file(path)?,
        None => {
            info!("no configuration file given, using defaults");
            StowageConfig::default()
        }
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let metadata = create_metadata_store(&config.metadata).await?;

    let blobs = BlobStore::new(PathBuf::from(&config.storage.root));
    blobs.ensure_root().await?;
    info!(root = %config.storage.root, "storage root ready");

    let service = Arc::new(FileService::new(
        Arc::clone(&metadata),
        blobs.clone(),
        FileServiceConfig {
            max_file_size: config.limits.max_file_size_bytes,
        },
    ));

    let reconciler_handle = if config.reconciler.enabled {
        let (mut reconciler, shutdown_tx) = Reconciler::new(
            ReconcilerConfig {
                sweep_interval: Duration::from_secs(config.reconciler.sweep_interval_seconds),
                reservation_ttl: Duration::from_secs(config.reconciler.reservation_ttl_seconds),
            },
            metadata,
            blobs,
        );
        let handle = tokio::spawn(async move { reconciler.run().await });
        Some((handle, shutdown_tx))
    } else {
        warn!("reservation reconciler disabled; stale reservations will not be reclaimed");
        None
    };

    let app = api::router(AppState { service });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some((handle, shutdown_tx)) = reconciler_handle {
        let _ = shutdown_tx.send(()).await;
        let grace = Duration::from_secs(config.server.shutdown_timeout_seconds);
        if tokio::time::timeout(grace, handle).await.is_err() {
            error!("reconciler did not stop within the shutdown grace period");
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install terminate handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received terminate signal"),
    }
}
