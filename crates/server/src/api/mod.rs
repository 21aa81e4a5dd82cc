//! HTTP surface: routing, state, and error mapping.

pub mod files;
pub mod health;
pub mod openapi;
pub mod schemas;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use stowage_service::{FileService, FileServiceError};

use self::schemas::ErrorResponse;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FileService>,
}

/// HTTP-facing error wrapper around [`FileServiceError`].
///
/// Status mapping: `BadRequest` is 400, `NotFound` is 404, everything else
/// is 500. Bodies for 500s are generic; the cause is already logged at the
/// point of failure.
#[derive(Debug)]
pub struct ApiError(pub FileServiceError);

impl From<FileServiceError> for ApiError {
    fn from(err: FileServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            FileServiceError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            FileServiceError::NotFound => (StatusCode::NOT_FOUND, "file not found".to_string()),
            FileServiceError::Processing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "error processing file".to_string(),
            ),
            FileServiceError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // Leave headroom over the file cap for multipart framing; the service
    // enforces the exact per-file limit.
    let body_limit = usize::try_from(state.service.max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(files::MULTIPART_OVERHEAD);

    Router::new()
        .route("/v1/files", post(files::upload))
        .route(
            "/v1/files/{id}",
            get(files::get_metadata).delete(files::delete_file),
        )
        .route("/v1/files/{id}/download", get(files::download))
        .route("/v1/files/search/{from}/{to}", get(files::search_range))
        .route("/v1/files/range/{from}/{to}", delete(files::delete_range))
        .route("/health", get(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url(
            "/api-docs/openapi.json",
            openapi::ApiDoc::openapi(),
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
