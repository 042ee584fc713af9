//! HTTP boundary for message submission.
//!
//! A transport posts a [`MessagesPayload`] and hands back the reply body as
//! a byte stream. Any non-success status is a uniform failure.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::message::MessagesPayload;

/// Streamed reply body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Sends a submission and returns the streamed reply.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync + std::fmt::Debug {
    /// Post the payload.
    ///
    /// Returns `Ok(None)` when the server accepted the request but sent no
    /// readable body.
    async fn send(&self, payload: &MessagesPayload) -> Result<Option<ByteStream>>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint` resolved against `base_url`.
    pub fn new(base_url: impl AsRef<str>, endpoint: &str) -> Result<Self> {
        Self::with_client(base_url, endpoint, reqwest::Client::new())
    }

    /// Create a transport with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        endpoint: &str,
        http: reqwest::Client,
    ) -> Result<Self> {
        let endpoint = Url::parse(base_url.as_ref())?.join(endpoint)?;
        Ok(Self { endpoint, http })
    }

    /// The resolved submission URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl MessageTransport for HttpTransport {
    async fn send(&self, payload: &MessagesPayload) -> Result<Option<ByteStream>> {
        // `.json()` sets `Content-Type: application/json`.
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                name: "transport.status",
                status = status.as_u16(),
                body = %body,
                "Message endpoint returned an error status"
            );
            return Err(Error::Status {
                status: status.as_u16(),
            });
        }

        if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
            return Ok(None);
        }

        debug!(name: "transport.stream.opened", status = status.as_u16(), "Reply stream opened");
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));
        Ok(Some(Box::pin(stream)))
    }
}
