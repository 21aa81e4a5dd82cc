use utoipa::OpenApi;

use super::schemas;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage File Store API",
        description = "Upload, retrieve, and delete files with consistent metadata",
    ),
    paths(
        super::files::upload,
        super::files::get_metadata,
        super::files::download,
        super::files::delete_file,
        super::files::search_range,
        super::files::delete_range,
        super::health::health,
    ),
    components(schemas(
        schemas::FileResponse,
        schemas::UploadResponse,
        schemas::DeleteResponse,
        schemas::SearchResponse,
        schemas::RangeDeleteItem,
        schemas::RangeDeleteResponse,
        schemas::ErrorResponse,
        schemas::HealthResponse,
    ))
)]
pub struct ApiDoc;
