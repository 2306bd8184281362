//! Test helpers: build the router around in-memory pipeline collaborators.
//!
//! Run from workspace root: `cargo test -p tubedrop-api`.

#![allow(dead_code)]

use axum_test::TestServer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tubedrop_api::setup::{routes, services};
use tubedrop_core::{Config, DownloaderConfig, EncodingCandidate};
use tubedrop_processing::test_helpers::{
    resolved_source, MockFetcher, MockMuxer, MockResolver, MockStorage,
};
use tubedrop_processing::{DownloadPipeline, PipelineSettings, RetryPolicy};
use tubedrop_storage::{LinkSigner, LocalStorage};

pub const TEST_SECRET: &str = "integration-test-secret";
pub const SECRET_HEADER: &str = "X-API-Key";
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc123";
pub const VIDEO_TITLE: &str = "Sample Video";
pub const STORAGE_KEY: &str = "videos/Sample_Video_abc123.mp4";
pub const LOCAL_BASE_URL: &str = "http://localhost:8080";

/// Config with the S3 backend selected; `overrides` replace or add variables.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("API_SECRET", TEST_SECRET),
        ("STORAGE_BACKEND", "s3"),
        ("S3_BUCKET", "test-bucket"),
        ("S3_REGION", "us-east-1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    let config = DownloaderConfig::from_lookup(move |key| vars.get(key).cloned())
        .expect("test config is valid");
    Config(Box::new(config))
}

/// Fetcher knowing the format ids used by the fixtures in these tests.
pub fn default_fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_stream("22", b"combined-bytes")
        .with_stream("18", b"low-combined")
        .with_stream("137", b"video-track")
        .with_stream("251", b"audio-track")
}

pub fn resolver_with(candidates: Vec<EncodingCandidate>) -> MockResolver {
    MockResolver::new(resolved_source("abc123", VIDEO_TITLE, candidates))
}

fn pipeline_settings(config: &Config, scratch_root: &TempDir) -> PipelineSettings {
    PipelineSettings {
        scratch_root: scratch_root.path().to_path_buf(),
        retry: RetryPolicy::new(2, Duration::ZERO),
        ..PipelineSettings::from_config(config)
    }
}

/// Test application backed by in-memory storage.
pub struct TestApp {
    pub server: TestServer,
    pub resolver: Arc<MockResolver>,
    pub fetcher: Arc<MockFetcher>,
    pub muxer: Arc<MockMuxer>,
    pub storage: Arc<MockStorage>,
    pub scratch_root: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// True when no per-request scratch directory is left behind.
    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch_root.path())
            .expect("scratch root readable")
            .next()
            .is_none()
    }

    /// Total calls made to any pipeline collaborator.
    pub fn collaborator_calls(&self) -> usize {
        self.resolver.call_count()
            + self.fetcher.open_count()
            + self.muxer.call_count()
            + self.storage.upload_count()
            + self.storage.sign_count()
    }
}

pub fn setup_test_app(resolver: MockResolver, muxer: MockMuxer, storage: MockStorage) -> TestApp {
    setup_test_app_with(&[], resolver, muxer, storage)
}

/// Like [`setup_test_app`], with extra configuration variables.
pub fn setup_test_app_with(
    overrides: &[(&str, &str)],
    resolver: MockResolver,
    muxer: MockMuxer,
    storage: MockStorage,
) -> TestApp {
    let config = test_config(overrides);
    let scratch_root = tempfile::tempdir().expect("Failed to create scratch root");

    let resolver = Arc::new(resolver);
    let fetcher = Arc::new(default_fetcher());
    let muxer = Arc::new(muxer);
    let storage = Arc::new(storage);

    let pipeline = DownloadPipeline::new(
        resolver.clone(),
        fetcher.clone(),
        muxer.clone(),
        storage.clone(),
        pipeline_settings(&config, &scratch_root),
    );
    let state = Arc::new(services::build_state(pipeline, None));
    let app = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        resolver,
        fetcher,
        muxer,
        storage,
        scratch_root,
    }
}

/// Test application backed by the real local filesystem backend.
pub struct LocalTestApp {
    pub server: TestServer,
    pub signer: LinkSigner,
    pub _objects: TempDir,
    pub _scratch_root: TempDir,
}

impl LocalTestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub async fn setup_local_app(resolver: MockResolver) -> LocalTestApp {
    let objects = tempfile::tempdir().expect("Failed to create storage root");
    let scratch_root = tempfile::tempdir().expect("Failed to create scratch root");
    let objects_path = objects.path().display().to_string();
    let config = test_config(&[
        ("STORAGE_BACKEND", "local"),
        ("LOCAL_STORAGE_PATH", objects_path.as_str()),
        ("LOCAL_STORAGE_BASE_URL", LOCAL_BASE_URL),
    ]);

    let signer = LinkSigner::new(config.link_signing_secret());
    let storage = Arc::new(
        LocalStorage::new(objects.path(), LOCAL_BASE_URL.to_string(), signer.clone())
            .await
            .expect("Failed to create local storage"),
    );

    let pipeline = DownloadPipeline::new(
        Arc::new(resolver),
        Arc::new(default_fetcher()),
        Arc::new(MockMuxer::new()),
        storage.clone(),
        pipeline_settings(&config, &scratch_root),
    );
    let state = Arc::new(services::build_state(pipeline, Some(storage)));
    let app = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    LocalTestApp {
        server,
        signer,
        _objects: objects,
        _scratch_root: scratch_root,
    }
}
