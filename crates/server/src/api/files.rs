//! File endpoints: upload, lookup, download, delete, and date ranges.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDate;
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::debug;

use stowage_core::ObjectId;
use stowage_service::FileServiceError;

use super::schemas::{
    DeleteResponse, FileResponse, RangeDeleteItem, RangeDeleteResponse, SearchResponse,
    UploadResponse,
};
use super::{ApiError, AppState};

/// Headroom allowed over the file-size cap for multipart boundaries and
/// part headers.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(FileServiceError::BadRequest(message.into()))
}

fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| bad_request(format!("invalid date '{value}', expected YYYY-MM-DD")))
}

/// Upload a file as the multipart field `file`.
#[utoipa::path(
    post,
    path = "/v1/files",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Invalid or oversized upload", body = super::schemas::ErrorResponse),
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    // Cheap rejection before any byte is read: a Content-Length that cannot
    // fit under the cap even after multipart framing is subtracted. The
    // service enforces the exact limit on the decoded stream.
    let max = state.service.max_file_size();
    if let Some(length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        if length > max.saturating_add(MULTIPART_OVERHEAD as u64) {
            return Err(bad_request(format!(
                "file exceeds maximum size of {max} bytes"
            )));
        }
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_owned();
        debug!(name = %name, "upload received");

        let body = StreamReader::new(Box::pin(field.map_err(std::io::Error::other)));
        let upload = state.service.upload(&name, 0, body).await?;
        return Ok((StatusCode::CREATED, Json(UploadResponse::from(&upload))).into_response());
    }

    Err(bad_request("missing multipart field 'file'"))
}

/// Fetch metadata for a stored file.
#[utoipa::path(
    get,
    path = "/v1/files/{id}",
    params(("id" = String, Path, description = "File identifier")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "No such file", body = super::schemas::ErrorResponse),
    )
)]
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let record = state.service.get(&ObjectId::from(id)).await?;
    Ok(Json(FileResponse::from(&record)))
}

/// Stream a stored file's bytes back to the caller.
#[utoipa::path(
    get,
    path = "/v1/files/{id}/download",
    params(("id" = String, Path, description = "File identifier")),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "No such file", body = super::schemas::ErrorResponse),
    )
)]
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (record, file) = state.service.download(&ObjectId::from(id)).await?;

    let filename = record.display_name.replace('"', "");
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (header::CONTENT_LENGTH, record.size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Delete a stored file.
#[utoipa::path(
    delete,
    path = "/v1/files/{id}",
    params(("id" = String, Path, description = "File identifier")),
    responses(
        (status = 200, description = "File deleted", body = DeleteResponse),
        (status = 404, description = "No such file", body = super::schemas::ErrorResponse),
    )
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = ObjectId::from(id);
    state.service.delete(&id).await?;
    Ok(Json(DeleteResponse { id: id.to_string() }))
}

/// List files committed within an inclusive calendar-day range (UTC).
#[utoipa::path(
    get,
    path = "/v1/files/search/{from}/{to}",
    params(
        ("from" = String, Path, description = "First day, YYYY-MM-DD"),
        ("to" = String, Path, description = "Last day, YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Matching files, oldest first", body = SearchResponse),
        (status = 400, description = "Malformed date", body = super::schemas::ErrorResponse),
    )
)]
pub async fn search_range(
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<SearchResponse>, ApiError> {
    let from = parse_date(&from)?;
    let to = parse_date(&to)?;

    let records = state.service.search_by_date_range(from, to).await?;
    let files: Vec<FileResponse> = records.iter().map(FileResponse::from).collect();
    Ok(Json(SearchResponse {
        count: files.len(),
        files,
    }))
}

/// Delete every file committed within an inclusive calendar-day range (UTC).
///
/// Deletions are independent per file; the response reports each outcome.
#[utoipa::path(
    delete,
    path = "/v1/files/range/{from}/{to}",
    params(
        ("from" = String, Path, description = "First day, YYYY-MM-DD"),
        ("to" = String, Path, description = "Last day, YYYY-MM-DD"),
    ),
    responses(
        (status = 200, description = "Per-file outcomes", body = RangeDeleteResponse),
        (status = 400, description = "Malformed date", body = super::schemas::ErrorResponse),
    )
)]
pub async fn delete_range(
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<RangeDeleteResponse>, ApiError> {
    let from = parse_date(&from)?;
    let to = parse_date(&to)?;

    let outcomes = state.service.delete_range(from, to).await?;
    let results: Vec<RangeDeleteItem> = outcomes
        .into_iter()
        .map(|outcome| RangeDeleteItem {
            id: outcome.id.to_string(),
            error: outcome.error.map(|e| e.kind().to_string()),
        })
        .collect();
    Ok(Json(RangeDeleteResponse {
        count: results.len(),
        results,
    }))
}
