//! The Fetch-Merge-Publish pipeline for one request.

use crate::assembly::AssemblyStage;
use crate::error::{PipelineError, ResolveError};
use crate::fetch::StreamFetcher;
use crate::mux::Muxer;
use crate::publisher::Publisher;
use crate::resolver::{quality_labels, select_plan, SourceResolver};
use crate::retry::RetryPolicy;
use crate::scratch::ScratchDir;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tubedrop_core::{Config, MediaSource, PublishedObject, SourceUrl, VideoDetails};
use tubedrop_storage::{video_object_key, Storage};

/// Tunables for a pipeline, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub scratch_root: PathBuf,
    pub object_key_prefix: String,
    pub min_combined_height: u32,
    pub link_ttl: Duration,
    pub resolve_timeout: Duration,
    pub transfer_timeout: Duration,
    pub mux_timeout: Duration,
    pub retry: RetryPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scratch_root: config.scratch_dir(),
            object_key_prefix: config.object_key_prefix().to_string(),
            min_combined_height: config.min_combined_height(),
            link_ttl: config.download_link_ttl(),
            resolve_timeout: config.resolve_timeout(),
            transfer_timeout: config.transfer_timeout(),
            mux_timeout: config.mux_timeout(),
            retry: RetryPolicy::new(config.retry_max_attempts(), config.retry_initial_backoff()),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub source: MediaSource,
    pub details: VideoDetails,
    pub available_qualities: Vec<String>,
    /// `combined` or `merged`.
    pub assembly: &'static str,
    pub published: PublishedObject,
}

pub struct DownloadPipeline {
    resolver: Arc<dyn SourceResolver>,
    assembly: AssemblyStage,
    publisher: Publisher,
    settings: PipelineSettings,
}

impl DownloadPipeline {
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        fetcher: Arc<dyn StreamFetcher>,
        muxer: Arc<dyn Muxer>,
        storage: Arc<dyn Storage>,
        settings: PipelineSettings,
    ) -> Self {
        let assembly = AssemblyStage::new(
            fetcher,
            muxer,
            settings.transfer_timeout,
            settings.mux_timeout,
            settings.retry,
        );
        let publisher = Publisher::new(storage, settings.link_ttl, settings.retry);
        Self {
            resolver,
            assembly,
            publisher,
            settings,
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Resolve, assemble and publish `url`.
    ///
    /// Stages run strictly in order. The scratch directory lives until
    /// publishing has finished and is removed on every exit path.
    #[tracing::instrument(skip(self, url), fields(video_id = %url.video_id()))]
    pub async fn run(&self, url: &SourceUrl) -> Result<PipelineOutput, PipelineError> {
        let start = std::time::Instant::now();

        let resolved = self.resolve(url).await?;
        let plan = select_plan(&resolved.candidates, self.settings.min_combined_height)?;
        let available_qualities = quality_labels(&resolved.candidates);

        tracing::info!(
            strategy = plan.strategy(),
            candidates = resolved.candidates.len(),
            "Assembly plan selected"
        );

        let storage_key = video_object_key(
            &self.settings.object_key_prefix,
            &resolved.source.safe_title,
            &resolved.source.video_id,
        );

        let scratch = ScratchDir::create(&self.settings.scratch_root)
            .await
            .map_err(PipelineError::Scratch)?;
        let file_name = format!("{}.mp4", resolved.source.video_id);
        let working = self.assembly.assemble(&plan, &scratch, &file_name).await?;
        let published = self.publisher.publish(&working, &storage_key).await?;
        drop(scratch);

        tracing::info!(
            storage_key = %published.storage_key,
            size_bytes = published.size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Pipeline completed"
        );

        Ok(PipelineOutput {
            source: resolved.source,
            details: resolved.details,
            available_qualities,
            assembly: plan.strategy(),
            published,
        })
    }

    async fn resolve(&self, url: &SourceUrl) -> Result<crate::resolver::ResolvedSource, ResolveError> {
        let resolver = &self.resolver;
        let bound = self.settings.resolve_timeout;
        self.settings
            .retry
            .run("resolve", move || async move {
                tokio::time::timeout(bound, resolver.resolve(url))
                    .await
                    .map_err(|_| ResolveError::Timeout(bound))?
            })
            .await
    }
}
