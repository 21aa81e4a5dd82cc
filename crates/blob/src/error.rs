use thiserror::Error;

/// Errors from blob store operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid stored name: {0}")]
    InvalidName(String),

    #[error("blob exceeds size limit of {0} bytes")]
    TooLarge(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
