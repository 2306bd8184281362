//! `POST /download`: run the Fetch-Merge-Publish pipeline for one URL.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tubedrop_core::{AppError, SourceUrl};
use tubedrop_processing::PipelineOutput;
use utoipa::ToSchema;
use validator::Validate;

const SUCCESS_MESSAGE: &str = "Video processed and uploaded successfully";

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DownloadRequest {
    /// A youtube.com or youtu.be video URL
    #[validate(
        required(message = "youtube_url is required"),
        length(
            min = 1,
            max = 2048,
            message = "youtube_url must be between 1 and 2048 characters"
        )
    )]
    pub youtube_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadResponse {
    pub status: String,
    pub video_title: String,
    pub video_thumbnail_url: Option<String>,
    pub video_description: String,
    pub video_length_seconds: u64,
    pub video_views: u64,
    pub author: String,
    pub publish_date: Option<String>,
    pub keywords: Vec<String>,
    /// Distinct quality labels, best first
    pub available_qualities: Vec<String>,
    /// Time-limited signed GET URL for the published file
    pub download_link: String,
    pub storage_key: String,
    pub expires_at: DateTime<Utc>,
    /// `combined` or `merged`
    pub assembly: String,
    pub message: String,
}

impl From<PipelineOutput> for DownloadResponse {
    fn from(output: PipelineOutput) -> Self {
        let details = output.details;
        Self {
            status: "success".to_string(),
            video_title: details.title,
            video_thumbnail_url: details.thumbnail_url,
            video_description: details.description,
            video_length_seconds: details.length_seconds,
            video_views: details.views,
            author: details.author,
            publish_date: details.publish_date,
            keywords: details.keywords,
            available_qualities: output.available_qualities,
            download_link: output.published.download_url,
            storage_key: output.published.storage_key,
            expires_at: output.published.expires_at,
            assembly: output.assembly.to_string(),
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/download",
    tag = "download",
    request_body = DownloadRequest,
    params(
        ("X-API-Key" = String, Header, description = "Shared secret (header name is configurable)")
    ),
    responses(
        (status = 200, description = "Video published", body = DownloadResponse),
        (status = 400, description = "Missing or unsupported URL", body = ErrorResponse),
        (status = 401, description = "Missing or invalid secret", body = ErrorResponse),
        (status = 500, description = "Resolution, assembly or publishing failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "download_video"))]
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<DownloadRequest>,
) -> Result<Json<DownloadResponse>, HttpAppError> {
    request.validate().map_err(AppError::from)?;
    let raw_url = request.youtube_url.unwrap_or_default();

    let url =
        SourceUrl::parse(&raw_url).map_err(|e| HttpAppError::from(e).with_youtube_url(&raw_url))?;

    tracing::info!(video_id = %url.video_id(), "Download requested");

    let output = state
        .pipeline
        .run(&url)
        .await
        .map_err(|e| HttpAppError::from(e).with_youtube_url(&raw_url))?;

    Ok(Json(DownloadResponse::from(output)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubedrop_core::ErrorMetadata;

    fn request(url: Option<&str>) -> DownloadRequest {
        DownloadRequest {
            youtube_url: url.map(String::from),
        }
    }

    #[test]
    fn test_request_requires_url() {
        let err = request(None).validate().unwrap_err();
        assert!(err.to_string().contains("youtube_url is required"));
        assert!(request(Some("")).validate().is_err());
    }

    #[test]
    fn test_request_rejects_overlong_url() {
        let url = format!("https://www.youtube.com/watch?v=abc123&pad={}", "x".repeat(2048));
        let err: AppError = request(Some(&url)).validate().unwrap_err().into();
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_request_accepts_watch_url() {
        assert!(request(Some("https://youtu.be/abc123")).validate().is_ok());
    }
}
