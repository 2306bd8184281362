//! Merging separate video and audio tracks into one container.

use crate::error::MergeError;
use crate::fetch::{spool_to_file, ByteStream};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Codec and container selection for a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxOptions {
    pub video_codec: String,
    pub audio_codec: String,
    pub container: String,
}

impl Default for MuxOptions {
    /// Video copied untouched, audio to AAC, MP4 container.
    fn default() -> Self {
        Self {
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            container: "mp4".to_string(),
        }
    }
}

/// One merge: the two input streams and where the result goes.
pub struct MuxJob {
    pub video: ByteStream,
    pub audio: ByteStream,
    /// Directory the muxer may use for intermediate files.
    pub workdir: PathBuf,
    pub output: PathBuf,
    pub options: MuxOptions,
}

#[async_trait]
pub trait Muxer: Send + Sync {
    /// Produce `job.output`. Returns only once the output is complete or the merge failed.
    async fn mux(&self, job: MuxJob) -> Result<(), MergeError>;
}

/// Muxes with an `ffmpeg` subprocess.
pub struct FfmpegMuxer {
    ffmpeg_path: String,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }

    fn args(video: &Path, audio: &Path, output: &Path, options: &MuxOptions) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            options.video_codec.clone(),
            "-c:a".to_string(),
            options.audio_codec.clone(),
            "-f".to_string(),
            options.container.clone(),
        ];
        if options.container == "mp4" {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }
        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    #[tracing::instrument(skip_all)]
    async fn mux(&self, job: MuxJob) -> Result<(), MergeError> {
        let MuxJob {
            video,
            audio,
            workdir,
            output,
            options,
        } = job;

        // ffmpeg reads a single stdin; both tracks are landed as files first,
        // concurrently, before the subprocess starts.
        let video_path = workdir.join("video.part");
        let audio_path = workdir.join("audio.part");
        let (video_bytes, audio_bytes) = tokio::try_join!(
            spool_to_file(video, &video_path),
            spool_to_file(audio, &audio_path)
        )?;
        tracing::debug!(video_bytes, audio_bytes, "Merge inputs received");

        let start = std::time::Instant::now();
        let args = Self::args(&video_path, &audio_path, &output, &options);

        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MergeError::Spawn(format!("{}: {}", self.ffmpeg_path, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            tracing::error!(
                status = %result.status,
                stderr = %stderr,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "FFmpeg merge failed"
            );
            return Err(MergeError::Subprocess {
                status: result.status.to_string(),
                stderr,
            });
        }

        tracing::info!(
            output = %output.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FFmpeg merge completed"
        );
        Ok(())
    }
}
