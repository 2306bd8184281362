//! Pipeline collaborators and application state.

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tubedrop_core::Config;
use tubedrop_processing::{
    DownloadPipeline, FfmpegMuxer, HttpStreamFetcher, PipelineSettings, YtDlpResolver,
};
use tubedrop_storage::{ConfiguredStorage, LocalStorage};

/// Wire the production resolver, fetcher and muxer around the configured storage.
pub fn initialize_services(config: &Config, storage: ConfiguredStorage) -> Result<Arc<AppState>> {
    let resolver = Arc::new(YtDlpResolver::new(config.ytdlp_path().to_string()));
    let fetcher = Arc::new(HttpStreamFetcher::new().context("Failed to build HTTP client")?);
    let muxer = Arc::new(FfmpegMuxer::new(config.ffmpeg_path().to_string()));
    let settings = PipelineSettings::from_config(config);

    tracing::info!(
        ytdlp_path = %config.ytdlp_path(),
        ffmpeg_path = %config.ffmpeg_path(),
        scratch_root = %settings.scratch_root.display(),
        min_combined_height = settings.min_combined_height,
        retry_max_attempts = settings.retry.max_attempts(),
        "Download pipeline configured"
    );

    let pipeline = DownloadPipeline::new(resolver, fetcher, muxer, storage.storage, settings);

    Ok(Arc::new(build_state(pipeline, storage.local)))
}

/// Assemble [`AppState`] from an already built pipeline.
pub fn build_state(pipeline: DownloadPipeline, local_files: Option<Arc<LocalStorage>>) -> AppState {
    AppState {
        pipeline: Arc::new(pipeline),
        local_files,
    }
}
