//! Tubedrop Processing Library
//!
//! The Fetch-Merge-Publish pipeline: resolve a source into candidate
//! encodings, assemble one playable MP4 in a per-request scratch directory,
//! then publish it to storage and mint a download link.

pub mod assembly;
pub mod error;
pub mod fetch;
pub mod mux;
pub mod pipeline;
pub mod publisher;
pub mod resolver;
pub mod retry;
pub mod scratch;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use assembly::{AssemblyStage, WorkingFile};
pub use error::{FetchError, MergeError, PipelineError, ResolveError};
pub use fetch::{spool_to_file, ByteStream, HttpStreamFetcher, StreamFetcher};
pub use mux::{FfmpegMuxer, MuxJob, MuxOptions, Muxer};
pub use pipeline::{DownloadPipeline, PipelineOutput, PipelineSettings};
pub use publisher::Publisher;
pub use resolver::{quality_labels, select_plan, ResolvedSource, SourceResolver, YtDlpResolver};
pub use retry::{RetryPolicy, Transient};
pub use scratch::ScratchDir;
