//! Stage-level error types for the download pipeline.

use crate::retry::Transient;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tubedrop_core::AppError;
use tubedrop_storage::StorageError;

/// Failure to obtain metadata or candidates for a source.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The source exists in no retrievable form (private, removed, geo-blocked, bad id).
    #[error("Video unavailable: {0}")]
    Unavailable(String),

    /// The extractor could not reach the platform.
    #[error("Network error while resolving: {0}")]
    Network(String),

    #[error("Failed to run extractor: {0}")]
    Spawn(String),

    #[error("Unexpected extractor output: {0}")]
    Parse(String),

    #[error("Resolution timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl Transient for ResolveError {
    fn is_transient(&self) -> bool {
        matches!(self, ResolveError::Network(_) | ResolveError::Timeout(_))
    }
}

/// Failure while reading a remote stream or writing it to disk.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request for format {format_id} failed: {message}")]
    Request { format_id: String, message: String },

    #[error("Remote returned HTTP {status} for format {format_id}")]
    Status { format_id: String, status: u16 },

    #[error("Stream interrupted: {0}")]
    Body(String),

    #[error("Local write failed: {0}")]
    Io(#[from] io::Error),

    #[error("Transfer timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { .. } | FetchError::Body(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Io(_) => false,
        }
    }
}

/// Failure while producing a merged file from separate tracks.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Input stream failed: {0}")]
    Input(#[from] FetchError),

    #[error("Failed to start muxer: {0}")]
    Spawn(String),

    /// The muxer ran and rejected its inputs; carries its diagnostic output verbatim.
    #[error("Muxer exited with {status}: {stderr}")]
    Subprocess { status: String, stderr: String },

    #[error("Muxer produced no output at {0}")]
    MissingOutput(String),

    #[error("Muxing timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Error for one pipeline run, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    NoSuitableStream(String),

    #[error(transparent)]
    Transfer(#[from] FetchError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Publish(#[from] StorageError),

    #[error("Scratch directory unavailable: {0}")]
    Scratch(#[source] io::Error),
}

impl PipelineError {
    /// Short stage name for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Resolve(_) | PipelineError::NoSuitableStream(_) => "resolve",
            PipelineError::Transfer(_) | PipelineError::Merge(_) => "assemble",
            PipelineError::Publish(_) => "publish",
            PipelineError::Scratch(_) => "scratch",
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Resolve(e) => AppError::Resolution(e.to_string()),
            PipelineError::NoSuitableStream(msg) => AppError::NoSuitableStream(msg),
            PipelineError::Transfer(e) => AppError::Transfer(e.to_string()),
            PipelineError::Merge(e) => AppError::Merge(e.to_string()),
            PipelineError::Publish(e) => AppError::Publish(e.to_string()),
            PipelineError::Scratch(e) => AppError::Internal(format!("Scratch directory: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubedrop_core::ErrorMetadata;

    #[test]
    fn merge_failures_keep_muxer_diagnostics() {
        let err: AppError = PipelineError::Merge(MergeError::Subprocess {
            status: "exit status: 1".to_string(),
            stderr: "Could not find tag for codec vp9 in stream #0".to_string(),
        })
        .into();
        assert_eq!(err.error_code(), "MERGE_ERROR");
        assert!(err
            .client_message()
            .contains("Could not find tag for codec vp9 in stream #0"));
    }

    #[test]
    fn publish_failures_keep_storage_text() {
        let err: AppError =
            PipelineError::Publish(StorageError::UploadFailed("bucket unreachable".to_string()))
                .into();
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "PUBLISH_ERROR");
        assert!(err.client_message().contains("Upload failed: bucket unreachable"));
    }

    #[test]
    fn stage_names() {
        assert_eq!(
            PipelineError::NoSuitableStream("x".into()).stage(),
            "resolve"
        );
        assert_eq!(
            PipelineError::Transfer(FetchError::Body("reset".into())).stage(),
            "assemble"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ResolveError::Network("timed out".into()).is_transient());
        assert!(!ResolveError::Unavailable("Private video".into()).is_transient());
        assert!(FetchError::Status {
            format_id: "18".into(),
            status: 503
        }
        .is_transient());
        assert!(!FetchError::Status {
            format_id: "18".into(),
            status: 403
        }
        .is_transient());
    }
}
