//! OpenAPI documentation, served at `/openapi.json`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use crate::handlers::download::{DownloadRequest, DownloadResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tubedrop API",
        version = "0.1.0",
        description = "Fetches a YouTube video, assembles a single MP4 (merging separate video and audio tracks when needed), publishes it to object storage and returns a time-limited download link."
    ),
    paths(
        handlers::download::download_video,
        handlers::health::liveness_check,
    ),
    components(schemas(DownloadRequest, DownloadResponse, ErrorResponse)),
    tags(
        (name = "download", description = "Fetch-Merge-Publish"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_download_and_health() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/download"));
        assert!(spec.paths.paths.contains_key("/health"));
    }
}
