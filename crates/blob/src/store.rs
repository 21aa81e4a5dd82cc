use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::BlobError;

/// Copy buffer size for streaming writes and downloads.
const CHUNK_SIZE: usize = 64 * 1024;

/// Durable byte storage under a single root directory, one file per stored
/// name.
///
/// The root is injected at construction; there is no process-wide default
/// path. All operations are confined to the root: stored names are validated
/// against path separators and parent-directory components before any
/// filesystem call.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a blob store rooted at `root`. No I/O happens here; call
    /// [`Self::ensure_root`] before the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if it does not exist.
    ///
    /// Idempotent and safe to call concurrently from many operations:
    /// `create_dir_all` does not fail when the directory already exists.
    pub async fn ensure_root(&self) -> Result<(), BlobError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Stream `reader` into the blob addressed by `stored_name`, returning
    /// the number of bytes written.
    ///
    /// The copy is chunked and enforces `limit` mid-stream; exceeding it
    /// aborts with [`BlobError::TooLarge`]. A capped-out or failed write
    /// removes the partial file best-effort before returning.
    pub async fn write<R>(
        &self,
        stored_name: &str,
        mut reader: R,
        limit: u64,
    ) -> Result<u64, BlobError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = self.blob_path(stored_name)?;
        let mut file = fs::File::create(&path).await?;

        let mut written: u64 = 0;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let result = loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(BlobError::Io(e)),
            };
            written += n as u64;
            if written > limit {
                break Err(BlobError::TooLarge(limit));
            }
            if let Err(e) = file.write_all(&buf[..n]).await {
                break Err(BlobError::Io(e));
            }
        };

        match result {
            Ok(()) => {
                file.flush().await?;
                file.sync_all().await?;
                debug!(stored_name, bytes = written, "blob written");
                Ok(written)
            }
            Err(e) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&path).await {
                    warn!(
                        stored_name,
                        error = %remove_err,
                        "failed to remove partial blob after aborted write"
                    );
                }
                Err(e)
            }
        }
    }

    /// Open the blob for reading, returning the file handle and its length.
    pub async fn open(&self, stored_name: &str) -> Result<(fs::File, u64), BlobError> {
        let path = self.blob_path(stored_name)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound(stored_name.to_owned()));
            }
            Err(e) => return Err(BlobError::Io(e)),
        };
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Remove the blob. Returns [`BlobError::NotFound`] when it is absent.
    pub async fn remove(&self, stored_name: &str) -> Result<(), BlobError> {
        let path = self.blob_path(stored_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(stored_name.to_owned()))
            }
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    /// Resolve a stored name to its path under the root, rejecting anything
    /// that could escape it.
    fn blob_path(&self, stored_name: &str) -> Result<PathBuf, BlobError> {
        if stored_name.is_empty()
            || stored_name.contains(['/', '\\'])
            || stored_name.contains("..")
        {
            return Err(BlobError::InvalidName(stored_name.to_owned()));
        }
        Ok(self.root.join(stored_name))
    }
}
