//! Storage backend setup

use anyhow::{Context, Result};
use tubedrop_core::Config;
use tubedrop_storage::{create_storage, ConfiguredStorage};

pub async fn setup_storage(config: &Config) -> Result<ConfiguredStorage> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;

    match config.storage_backend() {
        tubedrop_core::StorageBackend::S3 => tracing::info!(
            bucket = config.s3_bucket().unwrap_or_default(),
            region = config.s3_region().unwrap_or_default(),
            endpoint = config.s3_endpoint().unwrap_or("aws"),
            "S3 storage initialized"
        ),
        tubedrop_core::StorageBackend::Local => tracing::info!(
            path = config.local_storage_path().unwrap_or_default(),
            base_url = config.local_storage_base_url().unwrap_or_default(),
            "Local storage initialized"
        ),
    }

    Ok(storage)
}
