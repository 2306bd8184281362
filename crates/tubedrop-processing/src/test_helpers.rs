//! In-memory collaborators and fixtures for pipeline tests.

use crate::error::{FetchError, MergeError, ResolveError};
use crate::fetch::{ByteStream, StreamFetcher};
use crate::mux::{MuxJob, MuxOptions, Muxer};
use crate::resolver::{ResolvedSource, SourceResolver};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tubedrop_core::{
    sanitize_title, EncodingCandidate, MediaSource, SourceUrl, StreamHandle, VideoDetails,
};
use tubedrop_storage::{Storage, StorageError, StorageResult};

fn candidate(
    format_id: &str,
    height: Option<u32>,
    abr: Option<u32>,
    has_video: bool,
    has_audio: bool,
    container: &str,
) -> EncodingCandidate {
    EncodingCandidate {
        height,
        audio_bitrate_kbps: abr,
        total_bitrate_kbps: None,
        has_video,
        has_audio,
        container: container.to_string(),
        handle: StreamHandle {
            format_id: format_id.to_string(),
            url: format!("https://media.test/{}", format_id),
            headers: Vec::new(),
        },
    }
}

pub fn combined(format_id: &str, height: u32) -> EncodingCandidate {
    candidate(format_id, Some(height), Some(128), true, true, "mp4")
}

pub fn video_only(format_id: &str, height: u32) -> EncodingCandidate {
    candidate(format_id, Some(height), None, true, false, "mp4")
}

pub fn audio_only(format_id: &str, abr_kbps: u32) -> EncodingCandidate {
    candidate(format_id, None, Some(abr_kbps), false, true, "m4a")
}

/// A resolved source with fixed metadata and the given candidates.
pub fn resolved_source(video_id: &str, title: &str, candidates: Vec<EncodingCandidate>) -> ResolvedSource {
    ResolvedSource {
        source: MediaSource {
            url: format!("https://www.youtube.com/watch?v={}", video_id),
            video_id: video_id.to_string(),
            title: title.to_string(),
            safe_title: sanitize_title(title),
        },
        details: VideoDetails {
            title: title.to_string(),
            description: "A test video".to_string(),
            thumbnail_url: Some(format!("https://img.test/{}.jpg", video_id)),
            length_seconds: 212,
            views: 1000,
            author: "Test Channel".to_string(),
            publish_date: Some("2024-01-31".to_string()),
            keywords: vec!["test".to_string(), "video".to_string()],
        },
        candidates,
    }
}

/// Resolver returning a canned answer.
pub struct MockResolver {
    result: Result<ResolvedSource, String>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub fn new(resolved: ResolvedSource) -> Self {
        Self {
            result: Ok(resolved),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with `ResolveError::Unavailable(message)`.
    pub fn unavailable(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceResolver for MockResolver {
    async fn resolve(&self, url: &SourceUrl) -> Result<ResolvedSource, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(resolved) => {
                let mut resolved = resolved.clone();
                resolved.source.url = url.as_str().to_string();
                Ok(resolved)
            }
            Err(message) => Err(ResolveError::Unavailable(message.clone())),
        }
    }
}

/// Fetcher serving fixed bytes per format id.
pub struct MockFetcher {
    streams: HashMap<String, &'static [u8]>,
    fail_first: usize,
    opens: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
            fail_first: 0,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn with_stream(mut self, format_id: &str, data: &'static [u8]) -> Self {
        self.streams.insert(format_id.to_string(), data);
        self
    }

    /// The first `n` opens fail with a transient error.
    pub fn failing_first_opens(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamFetcher for MockFetcher {
    async fn open(&self, handle: &StreamHandle) -> Result<ByteStream, FetchError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(FetchError::Request {
                format_id: handle.format_id.clone(),
                message: "connection reset by peer".to_string(),
            });
        }
        let data = self
            .streams
            .get(&handle.format_id)
            .ok_or_else(|| FetchError::Status {
                format_id: handle.format_id.clone(),
                status: 404,
            })?;
        // Two chunks, so consumers see a multi-part stream.
        let (head, tail) = data.split_at(data.len() / 2);
        let chunks = vec![Ok(Bytes::from_static(head)), Ok(Bytes::from_static(tail))];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// What a [`MockMuxer`] received.
#[derive(Debug, Clone)]
pub struct MuxCall {
    pub video: Vec<u8>,
    pub audio: Vec<u8>,
    pub options: MuxOptions,
}

/// Muxer that concatenates its inputs, or fails with a fixed diagnostic.
pub struct MockMuxer {
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<MuxCall>>,
}

impl MockMuxer {
    pub fn new() -> Self {
        Self {
            failure: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every merge fails as if the subprocess printed `stderr`.
    pub fn failing(stderr: &str) -> Self {
        Self {
            failure: Some(stderr.to_string()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MuxCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockMuxer {
    fn default() -> Self {
        Self::new()
    }
}

async fn collect(stream: ByteStream) -> Result<Vec<u8>, FetchError> {
    let chunks: Vec<Result<Bytes, FetchError>> = stream.collect().await;
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

#[async_trait]
impl Muxer for MockMuxer {
    async fn mux(&self, job: MuxJob) -> Result<(), MergeError> {
        let (video, audio) = tokio::try_join!(collect(job.video), collect(job.audio))?;
        self.calls.lock().unwrap().push(MuxCall {
            video: video.clone(),
            audio: audio.clone(),
            options: job.options.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(stderr) = &self.failure {
            return Err(MergeError::Subprocess {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }

        let mut merged = video;
        merged.extend_from_slice(&audio);
        tokio::fs::write(&job.output, merged)
            .await
            .map_err(|e| MergeError::Input(FetchError::Io(e)))?;
        Ok(())
    }
}

/// Mock storage implementation that stores objects in memory
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    upload_failure: Option<String>,
    signing_failure: Option<String>,
    uploads: AtomicUsize,
    signs: AtomicUsize,
    deletes: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            upload_failure: None,
            signing_failure: None,
            uploads: AtomicUsize::new(0),
            signs: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Every upload fails with `StorageError::UploadFailed(message)`.
    pub fn failing_uploads(message: &str) -> Self {
        Self {
            upload_failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Uploads succeed; every signing call fails.
    pub fn failing_signing(message: &str) -> Self {
        Self {
            signing_failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Get object data (for test assertions)
    pub fn get_object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn sign_count(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// The URL this mock mints for `key`.
    pub fn signed_url_for(key: &str, expires_in: Duration) -> String {
        format!(
            "https://storage.test/{}?X-Amz-Expires={}&X-Amz-Signature=mock",
            key,
            expires_in.as_secs()
        )
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload_file(
        &self,
        storage_key: &str,
        path: &Path,
        _content_type: &str,
    ) -> StorageResult<u64> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.upload_failure {
            return Err(StorageError::UploadFailed(message.clone()));
        }
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), data);
        Ok(size)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.signing_failure {
            return Err(StorageError::SigningFailed(message.clone()));
        }
        Ok(Self::signed_url_for(storage_key, expires_in))
    }
}
