//! Background reconciliation of expired upload reservations.
//!
//! A reservation that never reached commit marks a partial upload: the
//! metadata row is pending and a blob may or may not have been written.
//! The reconciler periodically removes both sides once the reservation has
//! outlived its TTL, which keeps the "blob without committed record" state
//! strictly transient.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use stowage_blob::{BlobError, BlobStore};
use stowage_metadata::MetadataStore;

use crate::error::FileServiceError;

/// Configuration for the reservation reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often to sweep for stale reservations (default: 60 seconds).
    pub sweep_interval: Duration,
    /// How long a reservation may stay pending before it is reclaimed
    /// (default: 15 minutes). Must comfortably exceed the longest expected
    /// upload.
    pub reservation_ttl: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            reservation_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Periodic sweep that reclaims stale reservations and their orphan blobs.
pub struct Reconciler {
    config: ReconcilerConfig,
    metadata: Arc<dyn MetadataStore>,
    blobs: BlobStore,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Reconciler {
    /// Create a reconciler and the sender used to signal shutdown.
    pub fn new(
        config: ReconcilerConfig,
        metadata: Arc<dyn MetadataStore>,
        blobs: BlobStore,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                config,
                metadata,
                blobs,
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Run the sweep loop until shutdown is signaled.
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            ttl_secs = self.config.reservation_ttl.as_secs(),
            "reservation reconciler starting"
        );

        let mut timer = interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("reservation reconciler received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    match self.sweep().await {
                        Ok(0) => {}
                        Ok(n) => info!(reclaimed = n, "sweep reclaimed stale reservations"),
                        Err(e) => error!(error = %e, "reservation sweep failed"),
                    }
                }
            }
        }

        info!("reservation reconciler stopped");
    }

    /// Run one sweep pass, returning how many reservations were reclaimed.
    ///
    /// Per-item failures are logged and skipped so one bad entry cannot
    /// stall the rest; the skipped entry is retried on the next pass.
    pub async fn sweep(&self) -> Result<usize, FileServiceError> {
        let ttl = chrono::Duration::from_std(self.config.reservation_ttl)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = Utc::now() - ttl;

        let stale = self
            .metadata
            .stale_reservations(cutoff)
            .await
            .map_err(|e| {
                FileServiceError::Internal(format!("failed to list stale reservations: {e}"))
            })?;

        let mut reclaimed = 0;
        for record in stale {
            debug!(id = %record.id, stored_name = %record.stored_name, "reclaiming stale reservation");

            // Remove the orphan blob first. A missing blob just means the
            // upload never got that far.
            match self.blobs.remove(&record.stored_name).await {
                Ok(()) | Err(BlobError::NotFound(_)) => {}
                Err(e) => {
                    warn!(id = %record.id, error = %e, "failed to remove orphan blob; will retry");
                    continue;
                }
            }

            match self.metadata.remove_reservation(&record.id).await {
                Ok(_) => reclaimed += 1,
                Err(e) => {
                    warn!(id = %record.id, error = %e, "failed to remove stale reservation");
                }
            }
        }

        Ok(reclaimed)
    }
}
