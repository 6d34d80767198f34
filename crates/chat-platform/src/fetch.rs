//! HTTP artifact fetcher.
//!
//! Streams the response body so the inspector can stop reading as soon as
//! a size limit is crossed. The client timeout bounds the whole download.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use chat_core::ports::{ByteStream, FetchPort};
use chat_types::{ChatError, Result};

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchPort for HttpFetcher {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ChatError::UnreachableSource(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::UnreachableSource(format!(
                "{}: HTTP {}",
                url,
                status.as_u16()
            )));
        }
        log::debug!(
            "Fetching {} ({} bytes advertised)",
            url,
            response.content_length().map_or("unknown".to_string(), |n| n.to_string())
        );

        let source = url.to_string();
        let stream = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ChatError::UnreachableSource(format!("{}: {}", source, e)))
        });
        Ok(Box::pin(stream))
    }
}
