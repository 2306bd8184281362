//! Assembly stage: turn an [`AssemblyPlan`] into one finished file.

use crate::error::{FetchError, MergeError, PipelineError};
use crate::fetch::{spool_to_file, StreamFetcher};
use crate::mux::{MuxJob, MuxOptions, Muxer};
use crate::retry::RetryPolicy;
use crate::scratch::ScratchDir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tubedrop_core::{AssemblyPlan, EncodingCandidate};

/// A completely written output file inside a request's scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingFile {
    path: PathBuf,
    size_bytes: u64,
}

impl WorkingFile {
    pub(crate) fn new(path: PathBuf, size_bytes: u64) -> Self {
        Self { path, size_bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

pub struct AssemblyStage {
    fetcher: Arc<dyn StreamFetcher>,
    muxer: Arc<dyn Muxer>,
    transfer_timeout: Duration,
    mux_timeout: Duration,
    retry: RetryPolicy,
}

impl AssemblyStage {
    pub fn new(
        fetcher: Arc<dyn StreamFetcher>,
        muxer: Arc<dyn Muxer>,
        transfer_timeout: Duration,
        mux_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            muxer,
            transfer_timeout,
            mux_timeout,
            retry,
        }
    }

    /// Materialize `plan` as `scratch/<file_name>`.
    pub async fn assemble(
        &self,
        plan: &AssemblyPlan,
        scratch: &ScratchDir,
        file_name: &str,
    ) -> Result<WorkingFile, PipelineError> {
        let output = scratch.file(file_name);
        let start = std::time::Instant::now();

        match plan {
            AssemblyPlan::Combined(candidate) => {
                self.copy_combined(candidate, &output).await?;
            }
            AssemblyPlan::SeparateMerge { video, audio } => {
                self.merge(video, audio, scratch.path(), &output).await?;
            }
        }

        let size_bytes = tokio::fs::metadata(&output)
            .await
            .map_err(|_| MergeError::MissingOutput(output.display().to_string()))?
            .len();

        tracing::info!(
            strategy = plan.strategy(),
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Assembly completed"
        );

        Ok(WorkingFile::new(output, size_bytes))
    }

    async fn copy_combined(
        &self,
        candidate: &EncodingCandidate,
        output: &Path,
    ) -> Result<u64, FetchError> {
        let fetcher = &self.fetcher;
        let handle = &candidate.handle;
        let bound = self.transfer_timeout;

        // Each attempt reopens the stream and truncates the output.
        self.retry
            .run("transfer", move || async move {
                let attempt = async {
                    let stream = fetcher.open(handle).await?;
                    spool_to_file(stream, output).await
                };
                tokio::time::timeout(bound, attempt)
                    .await
                    .map_err(|_| FetchError::Timeout(bound))?
            })
            .await
    }

    async fn merge(
        &self,
        video: &EncodingCandidate,
        audio: &EncodingCandidate,
        workdir: &Path,
        output: &Path,
    ) -> Result<(), MergeError> {
        let (video_stream, audio_stream) = tokio::try_join!(
            self.fetcher.open(&video.handle),
            self.fetcher.open(&audio.handle)
        )?;

        let job = MuxJob {
            video: video_stream,
            audio: audio_stream,
            workdir: workdir.to_path_buf(),
            output: output.to_path_buf(),
            options: MuxOptions::default(),
        };

        // The muxer spools both inputs to disk before running, so the bound covers both phases.
        let bound = self.transfer_timeout.saturating_add(self.mux_timeout);
        tokio::time::timeout(bound, self.muxer.mux(job))
            .await
            .map_err(|_| MergeError::Timeout(bound))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        audio_only, combined, video_only, MockFetcher, MockMuxer,
    };

    fn stage(fetcher: Arc<MockFetcher>, muxer: Arc<MockMuxer>) -> AssemblyStage {
        AssemblyStage::new(
            fetcher,
            muxer,
            Duration::from_secs(5),
            Duration::from_secs(5),
            RetryPolicy::new(3, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn combined_copies_stream_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(MockFetcher::new().with_stream("22", b"combined-bytes"));
        let muxer = Arc::new(MockMuxer::new());

        let plan = AssemblyPlan::Combined(combined("22", 720));
        let file = stage(fetcher.clone(), muxer.clone())
            .assemble(&plan, &scratch, "out.mp4")
            .await
            .unwrap();

        assert_eq!(file.size_bytes(), 14);
        assert_eq!(std::fs::read(file.path()).unwrap(), b"combined-bytes");
        assert_eq!(muxer.call_count(), 0);
        assert_eq!(fetcher.open_count(), 1);
    }

    #[tokio::test]
    async fn combined_transfer_retries_and_rewrites() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_stream("22", b"good")
                .failing_first_opens(2),
        );

        let plan = AssemblyPlan::Combined(combined("22", 720));
        let file = stage(fetcher.clone(), Arc::new(MockMuxer::new()))
            .assemble(&plan, &scratch, "out.mp4")
            .await
            .unwrap();

        assert_eq!(std::fs::read(file.path()).unwrap(), b"good");
        assert_eq!(fetcher.open_count(), 3);
    }

    #[tokio::test]
    async fn combined_transfer_failure_is_transfer_error() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(MockFetcher::new());

        let plan = AssemblyPlan::Combined(combined("22", 720));
        let err = stage(fetcher, Arc::new(MockMuxer::new()))
            .assemble(&plan, &scratch, "out.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transfer(_)));
    }

    #[tokio::test]
    async fn merge_hands_both_streams_to_muxer() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_stream("137", b"video")
                .with_stream("251", b"audio"),
        );
        let muxer = Arc::new(MockMuxer::new());

        let plan = AssemblyPlan::SeparateMerge {
            video: video_only("137", 1080),
            audio: audio_only("251", 160),
        };
        let file = stage(fetcher, muxer.clone())
            .assemble(&plan, &scratch, "out.mp4")
            .await
            .unwrap();

        let calls = muxer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].video, b"video");
        assert_eq!(calls[0].audio, b"audio");
        assert_eq!(calls[0].options, MuxOptions::default());
        assert!(file.path().exists());
    }

    #[tokio::test]
    async fn merge_failure_surfaces_muxer_text_and_is_not_retried() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_stream("137", b"video")
                .with_stream("251", b"audio"),
        );
        let muxer = Arc::new(MockMuxer::failing("Invalid data found when processing input"));

        let plan = AssemblyPlan::SeparateMerge {
            video: video_only("137", 1080),
            audio: audio_only("251", 160),
        };
        let err = stage(fetcher, muxer.clone())
            .assemble(&plan, &scratch, "out.mp4")
            .await
            .unwrap_err();

        assert!(err
            .to_string()
            .contains("Invalid data found when processing input"));
        assert_eq!(muxer.call_count(), 1);
    }

    #[tokio::test]
    async fn merge_is_bounded_by_timeout() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_stream("137", b"video")
                .with_stream("251", b"audio"),
        );
        let muxer = Arc::new(MockMuxer::new().with_delay(Duration::from_secs(5)));
        let stage = AssemblyStage::new(
            fetcher,
            muxer,
            Duration::from_millis(10),
            Duration::from_millis(10),
            RetryPolicy::none(),
        );

        let plan = AssemblyPlan::SeparateMerge {
            video: video_only("137", 1080),
            audio: audio_only("251", 160),
        };
        let err = stage.assemble(&plan, &scratch, "out.mp4").await.unwrap_err();
        assert!(matches!(err, PipelineError::Merge(MergeError::Timeout(_))));
    }

    #[tokio::test]
    async fn merge_with_unbounded_timeouts_completes() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path()).await.unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_stream("137", b"video")
                .with_stream("251", b"audio"),
        );
        let muxer = Arc::new(MockMuxer::new());
        let stage = AssemblyStage::new(
            fetcher,
            muxer.clone(),
            Duration::from_secs(u64::MAX),
            Duration::from_secs(u64::MAX),
            RetryPolicy::none(),
        );

        let plan = AssemblyPlan::SeparateMerge {
            video: video_only("137", 1080),
            audio: audio_only("251", 160),
        };
        let file = stage.assemble(&plan, &scratch, "out.mp4").await.unwrap();
        assert!(file.path().exists());
        assert_eq!(muxer.call_count(), 1);
    }
}
