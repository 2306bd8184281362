//! Tubedrop Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! source-URL validation shared by the storage, processing and API crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, DownloaderConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    AssemblyPlan, CandidateKind, EncodingCandidate, MediaSource, PublishedObject, StreamHandle,
    VideoDetails,
};
pub use storage_types::StorageBackend;
pub use validation::{sanitize_title, SourceUrl};
