use thiserror::Error;

/// Errors from metadata store operations.
///
/// Absence of a record is not an error: lookups return `Option` and deletes
/// return `bool`, so callers are never coupled to a backend's "not found"
/// vocabulary.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("duplicate id: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}
