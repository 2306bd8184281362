//! Remote stream access.

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tubedrop_core::StreamHandle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Stream of remote bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Opens the byte stream behind a [`StreamHandle`].
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn open(&self, handle: &StreamHandle) -> Result<ByteStream, FetchError>;
}

/// Fetches streams over HTTP(S).
#[derive(Clone)]
pub struct HttpStreamFetcher {
    client: reqwest::Client,
}

impl HttpStreamFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Request {
                format_id: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamFetcher for HttpStreamFetcher {
    async fn open(&self, handle: &StreamHandle) -> Result<ByteStream, FetchError> {
        let mut request = self.client.get(&handle.url);
        for (name, value) in &handle.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| FetchError::Request {
            format_id: handle.format_id.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                format_id: handle.format_id.clone(),
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            format_id = %handle.format_id,
            content_length = ?response.content_length(),
            "Remote stream opened"
        );

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| FetchError::Body(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// Write `stream` to `path`, truncating any previous content.
///
/// The file is flushed and synced before returning the number of bytes written.
pub async fn spool_to_file(mut stream: ByteStream, path: &Path) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
