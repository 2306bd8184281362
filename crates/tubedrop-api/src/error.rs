//! HTTP error response conversion
//!
//! Every non-2xx response carries the same JSON envelope, [`ErrorResponse`].
//! Handlers return `Result<_, HttpAppError>`; domain errors convert through
//! [`AppError`] so status, code and logging stay consistent.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tubedrop_core::{AppError, ErrorMetadata, LogLevel};
use tubedrop_processing::PipelineError;
use tubedrop_storage::{LinkTokenError, StorageError};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `"error"`.
    pub status: String,
    pub message: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// The submitted URL, when one was recovered from the request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: code.into(),
            youtube_url: None,
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from tubedrop-core)
#[derive(Debug)]
pub struct HttpAppError {
    pub error: AppError,
    pub youtube_url: Option<String>,
}

impl HttpAppError {
    /// Echo the caller's input URL in the error envelope.
    pub fn with_youtube_url(mut self, youtube_url: impl Into<String>) -> Self {
        self.youtube_url = Some(youtube_url.into());
        self
    }
}

impl From<AppError> for HttpAppError {
    fn from(error: AppError) -> Self {
        HttpAppError {
            error,
            youtube_url: None,
        }
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(format!("Invalid request body: {}", rejection.body_text())).into()
    }
}

impl From<PipelineError> for HttpAppError {
    fn from(err: PipelineError) -> Self {
        tracing::error!(stage = err.stage(), error = %err, "Pipeline failed");
        AppError::from(err).into()
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::from(anyhow::Error::new(other).context("Failed to read stored object")),
        };
        app.into()
    }
}

impl From<LinkTokenError> for HttpAppError {
    fn from(err: LinkTokenError) -> Self {
        AppError::InvalidInput(format!("Invalid download token: {}", err)).into()
    }
}

/// JSON body extractor that returns our ErrorResponse format (400 + JSON) on deserialization failure.
/// Use this instead of `Json<T>` when you want a consistent API error shape for invalid bodies.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error,
                error_type = error_type,
                details = %error.detailed_message(),
                "Error occurred"
            );
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.error;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse {
            youtube_url: self.youtube_url,
            ..ErrorResponse::new(app_error.client_message(), app_error.error_code())
        };

        (status, Json(body)).into_response()
    }
}
