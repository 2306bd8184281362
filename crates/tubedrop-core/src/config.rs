//! Configuration module
//!
//! Configuration is read once at process start from the environment (after
//! loading `.env` if present) and treated as read-only afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_LINK_TTL_SECS, DEFAULT_MIN_COMBINED_HEIGHT, MAX_LINK_TTL_SECS};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const HTTP_CONCURRENCY_LIMIT: usize = 64;
const API_SECRET_HEADER: &str = "X-API-Key";
const OBJECT_KEY_PREFIX: &str = "videos";
const RESOLVE_TIMEOUT_SECS: u64 = 60;
const TRANSFER_TIMEOUT_SECS: u64 = 900;
const MUX_TIMEOUT_SECS: u64 = 900;
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;
const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_INITIAL_BACKOFF_MS: u64 = 500;

/// HTTP-facing settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub http_concurrency_limit: usize,
    pub api_secret: String,
    pub api_secret_header: String,
}

/// Full service configuration: HTTP, storage and pipeline settings.
#[derive(Clone, Debug)]
pub struct DownloaderConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub link_signing_secret: Option<String>,
    pub object_key_prefix: String,
    pub download_link_ttl_secs: u64,
    // Pipeline configuration
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    pub scratch_dir: Option<PathBuf>,
    pub min_combined_height: u32,
    pub resolve_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
    pub mux_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<DownloaderConfig>);

impl Config {
    fn inner(&self) -> &DownloaderConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = DownloaderConfig::from_lookup(|key| env::var(key).ok())?;
        Ok(Config(Box::new(config)))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().base.http_concurrency_limit
    }

    pub fn api_secret(&self) -> &str {
        &self.inner().base.api_secret
    }

    pub fn api_secret_header(&self) -> &str {
        &self.inner().base.api_secret_header
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    /// S3 region, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.inner()
            .s3_region
            .as_deref()
            .or(self.inner().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    /// Secret used to sign local-backend links; defaults to the API secret.
    pub fn link_signing_secret(&self) -> &str {
        self.inner()
            .link_signing_secret
            .as_deref()
            .unwrap_or(&self.inner().base.api_secret)
    }

    pub fn object_key_prefix(&self) -> &str {
        &self.inner().object_key_prefix
    }

    pub fn download_link_ttl(&self) -> Duration {
        Duration::from_secs(self.inner().download_link_ttl_secs)
    }

    pub fn ytdlp_path(&self) -> &str {
        &self.inner().ytdlp_path
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    /// Root under which per-request scratch directories are created.
    pub fn scratch_dir(&self) -> PathBuf {
        self.inner()
            .scratch_dir
            .clone()
            .unwrap_or_else(env::temp_dir)
    }

    pub fn min_combined_height(&self) -> u32 {
        self.inner().min_combined_height
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().resolve_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().transfer_timeout_secs)
    }

    pub fn mux_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().mux_timeout_secs)
    }

    pub fn retry_max_attempts(&self) -> u32 {
        self.inner().retry_max_attempts
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.inner().retry_initial_backoff_ms)
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, anyhow::Error> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
        _ => Ok(default),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl DownloaderConfig {
    /// Build configuration from a key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let environment = non_empty(&lookup, "ENVIRONMENT")
            .or_else(|| non_empty(&lookup, "APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str =
            non_empty(&lookup, "CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_env(&environment) && cors_origins_str == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: parse_or(&lookup, "PORT", SERVER_PORT)?,
            environment,
            cors_origins,
            http_concurrency_limit: parse_or(
                &lookup,
                "HTTP_CONCURRENCY_LIMIT",
                HTTP_CONCURRENCY_LIMIT,
            )?
            .max(1),
            api_secret: non_empty(&lookup, "API_SECRET")
                .ok_or_else(|| anyhow::anyhow!("API_SECRET must be set for authentication"))?,
            api_secret_header: non_empty(&lookup, "API_SECRET_HEADER")
                .unwrap_or_else(|| API_SECRET_HEADER.to_string()),
        };

        let storage_backend = match non_empty(&lookup, "STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::S3,
        };

        let config = DownloaderConfig {
            base,
            storage_backend,
            s3_bucket: non_empty(&lookup, "S3_BUCKET"),
            s3_region: non_empty(&lookup, "S3_REGION"),
            s3_endpoint: non_empty(&lookup, "S3_ENDPOINT"),
            aws_region: non_empty(&lookup, "AWS_REGION"),
            local_storage_path: non_empty(&lookup, "LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty(&lookup, "LOCAL_STORAGE_BASE_URL"),
            link_signing_secret: non_empty(&lookup, "LINK_SIGNING_SECRET"),
            object_key_prefix: non_empty(&lookup, "OBJECT_KEY_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| OBJECT_KEY_PREFIX.to_string()),
            download_link_ttl_secs: parse_or(
                &lookup,
                "DOWNLOAD_LINK_TTL_SECS",
                DEFAULT_LINK_TTL_SECS,
            )?,
            ytdlp_path: non_empty(&lookup, "YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_path: non_empty(&lookup, "FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            scratch_dir: non_empty(&lookup, "SCRATCH_DIR").map(PathBuf::from),
            min_combined_height: parse_or(
                &lookup,
                "MIN_COMBINED_HEIGHT",
                DEFAULT_MIN_COMBINED_HEIGHT,
            )?,
            resolve_timeout_secs: parse_or(&lookup, "RESOLVE_TIMEOUT_SECS", RESOLVE_TIMEOUT_SECS)?,
            transfer_timeout_secs: parse_or(
                &lookup,
                "TRANSFER_TIMEOUT_SECS",
                TRANSFER_TIMEOUT_SECS,
            )?,
            mux_timeout_secs: parse_or(&lookup, "MUX_TIMEOUT_SECS", MUX_TIMEOUT_SECS)?,
            retry_max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", RETRY_MAX_ATTEMPTS)?,
            retry_initial_backoff_ms: parse_or(
                &lookup,
                "RETRY_INITIAL_BACKOFF_MS",
                RETRY_INITIAL_BACKOFF_MS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.api_secret.trim().is_empty() {
            anyhow::bail!("API_SECRET must not be empty");
        }
        if self.download_link_ttl_secs == 0 || self.download_link_ttl_secs > MAX_LINK_TTL_SECS {
            anyhow::bail!(
                "DOWNLOAD_LINK_TTL_SECS must be between 1 and {}",
                MAX_LINK_TTL_SECS
            );
        }
        if self.retry_max_attempts == 0 {
            anyhow::bail!("RETRY_MAX_ATTEMPTS must be at least 1");
        }
        if self.resolve_timeout_secs == 0
            || self.transfer_timeout_secs == 0
            || self.mux_timeout_secs == 0
        {
            anyhow::bail!("Timeouts must be greater than zero");
        }
        if self.resolve_timeout_secs > MAX_TIMEOUT_SECS
            || self.transfer_timeout_secs > MAX_TIMEOUT_SECS
            || self.mux_timeout_secs > MAX_TIMEOUT_SECS
        {
            anyhow::bail!("Timeouts must not exceed {} seconds", MAX_TIMEOUT_SECS);
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    anyhow::bail!("S3_BUCKET must be set when using S3 storage backend");
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    anyhow::bail!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    );
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    anyhow::bail!(
                        "LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const S3_MINIMAL: &[(&str, &str)] = &[
        ("API_SECRET", "s3cret"),
        ("S3_BUCKET", "videos"),
        ("AWS_REGION", "eu-west-1"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config(Box::new(
            DownloaderConfig::from_lookup(lookup(S3_MINIMAL)).unwrap(),
        ));
        assert_eq!(config.server_port(), 8080);
        assert_eq!(config.api_secret_header(), "X-API-Key");
        assert_eq!(config.storage_backend(), StorageBackend::S3);
        assert_eq!(config.s3_region(), Some("eu-west-1"));
        assert_eq!(config.download_link_ttl(), Duration::from_secs(3600));
        assert_eq!(config.min_combined_height(), 360);
        assert_eq!(config.object_key_prefix(), "videos");
        assert_eq!(config.link_signing_secret(), "s3cret");
        assert_eq!(config.retry_max_attempts(), 3);
        assert!(!config.is_production());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = DownloaderConfig::from_lookup(lookup(&[
            ("S3_BUCKET", "videos"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("API_SECRET"));
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let err =
            DownloaderConfig::from_lookup(lookup(&[("API_SECRET", "s3cret")])).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn local_backend_requires_path_and_url() {
        let err = DownloaderConfig::from_lookup(lookup(&[
            ("API_SECRET", "s3cret"),
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/objects"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LOCAL_STORAGE_BASE_URL"));
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = DownloaderConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn timeouts_are_bounded() {
        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("MUX_TIMEOUT_SECS", "0"));
        assert!(DownloaderConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("TRANSFER_TIMEOUT_SECS", "18446744073709551615"));
        let err = DownloaderConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn ttl_is_bounded() {
        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("DOWNLOAD_LINK_TTL_SECS", "0"));
        assert!(DownloaderConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("DOWNLOAD_LINK_TTL_SECS", "9999999"));
        assert!(DownloaderConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn wildcard_cors_rejected_in_production() {
        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("ENVIRONMENT", "production"));
        assert!(DownloaderConfig::from_lookup(lookup(&pairs)).is_err());

        pairs.push(("CORS_ORIGINS", "https://app.example.com"));
        let config = Config(Box::new(DownloaderConfig::from_lookup(lookup(&pairs)).unwrap()));
        assert!(config.is_production());
        assert_eq!(config.cors_origins(), ["https://app.example.com".to_string()]);
    }

    #[test]
    fn key_prefix_is_trimmed_of_slashes() {
        let mut pairs = S3_MINIMAL.to_vec();
        pairs.push(("OBJECT_KEY_PREFIX", "/downloads/"));
        let config = Config(Box::new(DownloaderConfig::from_lookup(lookup(&pairs)).unwrap()));
        assert_eq!(config.object_key_prefix(), "downloads");
    }
}
