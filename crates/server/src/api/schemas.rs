//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use stowage_core::FileRecord;
use stowage_service::Upload;

/// Metadata view of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    /// Server-assigned identifier.
    pub id: String,
    /// Original file name as uploaded.
    pub name: String,
    /// Size in bytes actually stored.
    pub size: u64,
}

impl From<&FileRecord> for FileResponse {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.display_name.clone(),
            size: record.size,
        }
    }
}

/// Response to a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Content type detected from the leading bytes, when recognized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl From<&Upload> for UploadResponse {
    fn from(upload: &Upload) -> Self {
        Self {
            id: upload.record.id.to_string(),
            name: upload.record.display_name.clone(),
            size: upload.record.size,
            content_type: upload.content_type.clone(),
        }
    }
}

/// Response to a single-file delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub id: String,
}

/// Response to a date-range search.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub count: usize,
    pub files: Vec<FileResponse>,
}

/// Per-file outcome within a range delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RangeDeleteItem {
    pub id: String,
    /// Present when this file's deletion failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to a date-range delete.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RangeDeleteResponse {
    pub count: usize,
    pub results: Vec<RangeDeleteItem>,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health probe body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
