//! Publisher: durable upload plus a time-limited download link.

use crate::assembly::WorkingFile;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tubedrop_core::constants::VIDEO_CONTENT_TYPE;
use tubedrop_core::PublishedObject;
use tubedrop_storage::{Storage, StorageError};

pub struct Publisher {
    storage: Arc<dyn Storage>,
    link_ttl: Duration,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(storage: Arc<dyn Storage>, link_ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            storage,
            link_ttl,
            retry,
        }
    }

    /// Upload `file` under `storage_key`, then sign a GET link for it.
    ///
    /// If signing fails the uploaded object is removed (best effort) so no
    /// unsigned upload is left behind as a partial success.
    #[tracing::instrument(skip(self, file), fields(size_bytes = file.size_bytes()))]
    pub async fn publish(
        &self,
        file: &WorkingFile,
        storage_key: &str,
    ) -> Result<PublishedObject, StorageError> {
        let start = std::time::Instant::now();

        let storage = &self.storage;
        let path = file.path();
        let size_bytes = self
            .retry
            .run("upload", move || {
                storage.upload_file(storage_key, path, VIDEO_CONTENT_TYPE)
            })
            .await?;

        let (download_url, expires_at) = match self.issue_link(storage_key).await {
            Ok(link) => link,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(storage_key).await {
                    tracing::warn!(
                        error = %cleanup,
                        storage_key = %storage_key,
                        "Failed to remove unsigned upload"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            storage_key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Video published"
        );

        Ok(PublishedObject {
            storage_key: storage_key.to_string(),
            content_type: VIDEO_CONTENT_TYPE.to_string(),
            size_bytes,
            download_url,
            expires_at,
        })
    }

    /// Mint a fresh link for an already published key. Nothing is re-uploaded.
    pub async fn issue_link(
        &self,
        storage_key: &str,
    ) -> Result<(String, DateTime<Utc>), StorageError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.link_ttl)
                .map_err(|e| StorageError::SigningFailed(e.to_string()))?;
        let storage = &self.storage;
        let ttl = self.link_ttl;
        let url = self
            .retry
            .run("sign", move || storage.get_presigned_url(storage_key, ttl))
            .await?;
        Ok((url, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockStorage;

    async fn working_file(dir: &std::path::Path, data: &[u8]) -> WorkingFile {
        let path = dir.join("out.mp4");
        tokio::fs::write(&path, data).await.unwrap();
        WorkingFile::new(path, data.len() as u64)
    }

    fn publisher(storage: Arc<MockStorage>) -> Publisher {
        Publisher::new(
            storage,
            Duration::from_secs(3600),
            RetryPolicy::new(2, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn uploads_then_signs_a_get_link() {
        let dir = tempfile::tempdir().unwrap();
        let file = working_file(dir.path(), b"mp4").await;
        let storage = Arc::new(MockStorage::new());

        let before = Utc::now();
        let published = publisher(storage.clone())
            .publish(&file, "videos/clip_abc123.mp4")
            .await
            .unwrap();

        assert_eq!(storage.get_object("videos/clip_abc123.mp4").unwrap(), b"mp4");
        assert_eq!(published.size_bytes, 3);
        assert_eq!(published.content_type, "video/mp4");
        assert_eq!(
            published.download_url,
            MockStorage::signed_url_for("videos/clip_abc123.mp4", Duration::from_secs(3600))
        );
        assert!(published.expires_at >= before + chrono::Duration::seconds(3600));
    }

    #[tokio::test]
    async fn upload_failure_is_retried_then_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = working_file(dir.path(), b"mp4").await;
        let storage = Arc::new(MockStorage::failing_uploads("bucket unreachable"));

        let err = publisher(storage.clone())
            .publish(&file, "videos/clip.mp4")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("bucket unreachable"));
        assert_eq!(storage.upload_count(), 2);
        assert_eq!(storage.sign_count(), 0);
    }

    #[tokio::test]
    async fn signing_failure_removes_the_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = working_file(dir.path(), b"mp4").await;
        let storage = Arc::new(MockStorage::failing_signing("no credentials"));

        let err = publisher(storage.clone())
            .publish(&file, "videos/clip.mp4")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::SigningFailed(_)));
        assert!(!storage.has_object("videos/clip.mp4"));
        assert_eq!(storage.delete_count(), 1);
    }

    #[tokio::test]
    async fn issue_link_re_signs_without_uploading() {
        let storage = Arc::new(MockStorage::new());
        let publisher = publisher(storage.clone());

        let (url, _) = publisher.issue_link("videos/clip.mp4").await.unwrap();
        assert!(url.contains("videos/clip.mp4"));
        assert_eq!(storage.upload_count(), 0);
        assert_eq!(storage.sign_count(), 1);
    }
}
