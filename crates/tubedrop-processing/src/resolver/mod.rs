//! Source resolution: metadata and candidate encodings for a validated URL,
//! and the deterministic choice of an assembly plan among them.

mod selection;
mod ytdlp;

pub use selection::{quality_labels, rank_candidates, select_plan};
pub use ytdlp::YtDlpResolver;

use crate::error::ResolveError;
use async_trait::async_trait;
use tubedrop_core::{EncodingCandidate, MediaSource, SourceUrl, VideoDetails};

/// Everything known about a source after resolution.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub source: MediaSource,
    pub details: VideoDetails,
    pub candidates: Vec<EncodingCandidate>,
}

/// Obtains metadata and the full candidate list for a source.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, url: &SourceUrl) -> Result<ResolvedSource, ResolveError>;
}
