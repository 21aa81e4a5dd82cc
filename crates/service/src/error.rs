use thiserror::Error;

/// Error taxonomy exposed by the file service.
///
/// Backend causes are classified here and logged; they never travel past
/// this boundary. Detected inconsistency between metadata and blob storage
/// is always [`FileServiceError::Internal`], distinct from
/// [`FileServiceError::NotFound`], so that "never existed" and "storage
/// corruption" stay observable as different signals.
#[derive(Debug, Error)]
pub enum FileServiceError {
    /// The caller supplied invalid input: oversize upload, malformed date.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No committed record exists for the given id.
    #[error("file not found")]
    NotFound,

    /// Transient resource failure while moving bytes.
    #[error("file processing error: {0}")]
    Processing(String),

    /// Backend failure or detected metadata/blob inconsistency.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FileServiceError {
    /// Short stable tag for per-item batch reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound => "not_found",
            Self::Processing(_) => "processing",
            Self::Internal(_) => "internal",
        }
    }
}
