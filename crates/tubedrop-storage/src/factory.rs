#[cfg(feature = "storage-local")]
use crate::{LinkSigner, LocalStorage};
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use tubedrop_core::Config;

/// A configured backend.
#[derive(Clone)]
pub struct ConfiguredStorage {
    /// Publishing target for the pipeline.
    pub storage: Arc<dyn Storage>,
    /// Set when the backend serves its own download links.
    #[cfg(feature = "storage-local")]
    pub local: Option<Arc<LocalStorage>>,
}

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<ConfiguredStorage> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = S3Storage::new(bucket, region, endpoint)?;
            Ok(ConfiguredStorage {
                storage: Arc::new(storage),
                #[cfg(feature = "storage-local")]
                local: None,
            })
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config
                .local_storage_base_url()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
                })?;

            let signer = LinkSigner::new(config.link_signing_secret());
            let local = Arc::new(LocalStorage::new(base_path, base_url, signer).await?);
            Ok(ConfiguredStorage {
                storage: local.clone(),
                local: Some(local),
            })
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tubedrop_core::DownloaderConfig;

    #[tokio::test]
    async fn builds_local_backend_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("objects").display().to_string();
        let lookup = move |key: &str| match key {
            "API_SECRET" => Some("s3cret".to_string()),
            "STORAGE_BACKEND" => Some("local".to_string()),
            "LOCAL_STORAGE_PATH" => Some(root.clone()),
            "LOCAL_STORAGE_BASE_URL" => Some("http://localhost:8080".to_string()),
            _ => None,
        };
        let config = Config(Box::new(DownloaderConfig::from_lookup(lookup).unwrap()));

        let configured = create_storage(&config).await.unwrap();
        assert!(configured.local.is_some());
        assert!(dir.path().join("objects").is_dir());
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn s3_backend_serves_no_local_files() {
        let lookup = |key: &str| match key {
            "API_SECRET" => Some("s3cret".to_string()),
            "STORAGE_BACKEND" => Some("s3".to_string()),
            "S3_BUCKET" => Some("videos".to_string()),
            "S3_REGION" => Some("us-east-1".to_string()),
            _ => None,
        };
        let config = Config(Box::new(DownloaderConfig::from_lookup(lookup).unwrap()));

        let configured = create_storage(&config).await.unwrap();
        assert!(configured.local.is_none());
    }
}
