//! Public file route: serves a published file by signed token (no secret).
//! Mounted only for the local storage backend, whose download links point here.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tubedrop_core::constants::VIDEO_CONTENT_TYPE;
use tubedrop_core::AppError;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub token: Option<String>,
}

#[tracing::instrument(skip(state, query), fields(operation = "get_file"))]
pub async fn get_file(
    Query(query): Query<FileQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpAppError> {
    let token = query.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(AppError::InvalidInput("Missing token parameter".to_string()).into());
    }

    let storage = state
        .local_files
        .as_ref()
        .ok_or_else(|| AppError::NotFound("File links are not served by this backend".to_string()))?;
    let storage_key = storage.signer().verify(token)?;

    let stream = storage.download_stream(&storage_key).await?;
    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, VIDEO_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })
}
