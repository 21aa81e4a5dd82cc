use std::io::Cursor;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, warn};

use stowage_blob::{BlobError, BlobStore};
use stowage_core::{FileRecord, ObjectId};
use stowage_metadata::{MetadataError, MetadataStore};

use crate::error::FileServiceError;

/// Bytes inspected for content-type classification before the durable write.
const SNIFF_LEN: usize = 512;

/// Tunables for the file service.
#[derive(Debug, Clone)]
pub struct FileServiceConfig {
    /// Maximum accepted file size in bytes. Checked against the declared
    /// size before any byte is persisted, and enforced again mid-stream.
    pub max_file_size: u64,
}

impl Default for FileServiceConfig {
    fn default() -> Self {
        Self {
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

/// Result of a successful upload.
#[derive(Debug)]
pub struct Upload {
    /// The committed metadata record.
    pub record: FileRecord,
    /// Best-effort content type detected from the leading bytes.
    pub content_type: Option<String>,
}

/// Per-record outcome of a date-range delete.
#[derive(Debug)]
pub struct RangeDeleteOutcome {
    pub id: ObjectId,
    /// `None` on success; the specific failure otherwise.
    pub error: Option<FileServiceError>,
}

/// Orchestrates the identifier allocator, blob store, and metadata store
/// into the upload / get / download / delete / range operations.
///
/// Uploads follow a reserve-then-commit protocol: the id is reserved in the
/// metadata store before the blob is written and flipped to committed only
/// after the write succeeds. A reservation that never commits is reclaimed,
/// together with its orphaned blob, by the [`crate::Reconciler`] sweep, so
/// no partial failure can leave an unreachable blob behind permanently.
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    blobs: BlobStore,
    config: FileServiceConfig,
}

impl FileService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: BlobStore,
        config: FileServiceConfig,
    ) -> Self {
        Self {
            metadata,
            blobs,
            config,
        }
    }

    /// Configured per-file size ceiling in bytes.
    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Store an inbound byte stream and make its metadata record visible
    /// atomically.
    ///
    /// `declared_size` is checked against the configured maximum before any
    /// byte is persisted; the stream is additionally capped mid-copy, so a
    /// lying declaration cannot exceed the ceiling either. The recorded size
    /// is always the actual byte count written.
    pub async fn upload<R>(
        &self,
        declared_name: &str,
        declared_size: u64,
        mut body: R,
    ) -> Result<Upload, FileServiceError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let max = self.config.max_file_size;
        if declared_size > max {
            return Err(FileServiceError::BadRequest(format!(
                "file exceeds maximum size of {max} bytes"
            )));
        }

        // Sniff the leading bytes for classification, then chain them back
        // in front of the rest of the stream so the durable write sees the
        // full sequence.
        let mut prefix = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let n = body.read(&mut prefix[filled..]).await.map_err(|e| {
                warn!(error = %e, "failed to read upload stream");
                FileServiceError::Processing("failed to read upload stream".into())
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        prefix.truncate(filled);
        let content_type = infer::get(&prefix).map(|kind| kind.mime_type().to_owned());

        let id = ObjectId::allocate();
        let record = FileRecord::reserve(id.clone(), declared_name, Utc::now());
        debug!(
            id = %id,
            stored_name = %record.stored_name,
            content_type = content_type.as_deref().unwrap_or("unknown"),
            "upload reserved"
        );

        // Reserve before touching storage. A collision here means the
        // allocator lost the astronomically unlikely race; the upload fails
        // cleanly with nothing persisted.
        self.metadata.reserve(&record).await.map_err(|e| {
            error!(id = %id, error = %e, "failed to reserve upload");
            match e {
                MetadataError::Conflict(_) => {
                    FileServiceError::Internal("identifier collision".into())
                }
                _ => FileServiceError::Internal("metadata reservation failed".into()),
            }
        })?;

        if let Err(e) = self.blobs.ensure_root().await {
            error!(error = %e, "failed to create storage root");
            self.drop_reservation(&id).await;
            return Err(FileServiceError::Processing(
                "storage root unavailable".into(),
            ));
        }

        let reader = Cursor::new(prefix).chain(body);
        let written = match self.blobs.write(&record.stored_name, reader, max).await {
            Ok(written) => written,
            Err(BlobError::TooLarge(limit)) => {
                // Blob store already removed the partial file.
                self.drop_reservation(&id).await;
                return Err(FileServiceError::BadRequest(format!(
                    "file exceeds maximum size of {limit} bytes"
                )));
            }
            Err(e) => {
                warn!(id = %id, error = %e, "blob write failed");
                self.drop_reservation(&id).await;
                return Err(FileServiceError::Processing(
                    "failed to persist file".into(),
                ));
            }
        };

        match self.metadata.commit(&id, written, Utc::now()).await {
            Ok(Some(committed)) => {
                debug!(id = %id, size = written, "upload committed");
                Ok(Upload {
                    record: committed,
                    content_type,
                })
            }
            Ok(None) => {
                // The reservation outlived its TTL and was swept while the
                // blob was still being written. Remove the freshly written
                // blob; nothing references it.
                error!(id = %id, "reservation vanished before commit");
                if let Err(e) = self.blobs.remove(&record.stored_name).await {
                    warn!(id = %id, error = %e, "failed to remove uncommitted blob");
                }
                Err(FileServiceError::Internal(
                    "upload reservation expired".into(),
                ))
            }
            Err(e) => {
                // Blob and reservation both remain; the TTL sweep reclaims
                // them. No orphan survives past the reservation window.
                error!(id = %id, error = %e, "metadata commit failed");
                Err(FileServiceError::Internal("metadata commit failed".into()))
            }
        }
    }

    /// Resolve a committed record by id. Metadata only; the blob's existence
    /// is not verified here.
    pub async fn get(&self, id: &ObjectId) -> Result<FileRecord, FileServiceError> {
        match self.metadata.get(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(FileServiceError::NotFound),
            Err(e) => {
                error!(id = %id, error = %e, "metadata lookup failed");
                Err(FileServiceError::Internal("metadata lookup failed".into()))
            }
        }
    }

    /// Open the blob for a committed record.
    ///
    /// A missing blob despite present metadata is a detected inconsistency
    /// and surfaces as [`FileServiceError::Internal`], never as `NotFound`;
    /// healing is the reconciler's job, not the read path's.
    pub async fn download(
        &self,
        id: &ObjectId,
    ) -> Result<(FileRecord, tokio::fs::File), FileServiceError> {
        let record = self.get(id).await?;
        match self.blobs.open(&record.stored_name).await {
            Ok((file, len)) => {
                if len != record.size {
                    warn!(
                        id = %id,
                        recorded = record.size,
                        actual = len,
                        "blob length differs from recorded size"
                    );
                }
                Ok((record, file))
            }
            Err(BlobError::NotFound(_)) => {
                error!(id = %id, "blob missing for committed record");
                Err(FileServiceError::Internal(
                    "blob missing for committed record".into(),
                ))
            }
            Err(e) => {
                error!(id = %id, error = %e, "failed to open blob");
                Err(FileServiceError::Internal("failed to open blob".into()))
            }
        }
    }

    /// Remove the blob, then the metadata record.
    ///
    /// Ordering matters: if blob removal fails the metadata record is
    /// retained so the delete can be retried; removing metadata first would
    /// strand an unreachable, undeletable blob. Repeating a successful
    /// delete yields [`FileServiceError::NotFound`].
    pub async fn delete(&self, id: &ObjectId) -> Result<(), FileServiceError> {
        let record = self.get(id).await?;

        match self.blobs.remove(&record.stored_name).await {
            Ok(()) => {}
            Err(BlobError::NotFound(_)) => {
                error!(id = %id, "blob already missing for committed record");
                return Err(FileServiceError::Internal(
                    "blob missing for committed record".into(),
                ));
            }
            Err(e) => {
                error!(id = %id, error = %e, "failed to remove blob");
                return Err(FileServiceError::Internal("failed to remove blob".into()));
            }
        }

        match self.metadata.delete(id).await {
            // A concurrent delete winning the race is still a success:
            // blob and record are both gone.
            Ok(_) => Ok(()),
            Err(e) => {
                error!(id = %id, error = %e, "failed to delete metadata");
                Err(FileServiceError::Internal("failed to delete metadata".into()))
            }
        }
    }

    /// All committed records created within the inclusive calendar-day
    /// bounds, UTC, ascending by commit time.
    pub async fn search_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FileRecord>, FileServiceError> {
        let start = from.and_time(NaiveTime::MIN).and_utc();
        let end_of_day =
            NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        let end = to.and_time(end_of_day).and_utc();

        self.metadata.range(start, end).await.map_err(|e| {
            error!(error = %e, "metadata range query failed");
            FileServiceError::Internal("metadata range query failed".into())
        })
    }

    /// Delete every record in the date range, independently per record.
    ///
    /// Best-effort batch: an individual failure is captured against its id
    /// and the batch continues. There is no rollback across records; the
    /// caller can identify exactly which deletions took effect.
    pub async fn delete_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RangeDeleteOutcome>, FileServiceError> {
        let matched = self.search_by_date_range(from, to).await?;

        let mut outcomes = Vec::with_capacity(matched.len());
        for record in matched {
            let error = self.delete(&record.id).await.err();
            if let Some(ref e) = error {
                warn!(id = %record.id, error = %e, "range delete: item failed");
            }
            outcomes.push(RangeDeleteOutcome {
                id: record.id,
                error,
            });
        }
        Ok(outcomes)
    }

    /// Best-effort reservation cleanup on an aborted upload. Failure is
    /// logged and left to the TTL sweep.
    async fn drop_reservation(&self, id: &ObjectId) {
        match self.metadata.remove_reservation(id).await {
            Ok(_) => {}
            Err(e) => {
                warn!(id = %id, error = %e, "failed to remove reservation; sweep will reclaim it");
            }
        }
    }
}
