//! Fetch seam between the download manager and the network.
//!
//! [`MediaSource`] opens a URL and hands back a streaming [`MediaBody`].
//! [`HttpSource`] is the reqwest implementation; tests substitute an
//! in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;

/// Default user agent for media requests.
pub const DEFAULT_USER_AGENT: &str = concat!("mediavault/", env!("CARGO_PKG_VERSION"));

/// Errors from opening or reading a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Transport-level failure (DNS, connect, TLS, timeout, reset).
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body could not be read to the end.
    #[error("Reading body of {url} failed: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// HTTP status code, if the failure was a status response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A response body read chunk by chunk.
#[async_trait]
pub trait MediaBody: Send {
    /// Declared length, if the server sent one.
    fn content_length(&self) -> Option<u64>;

    /// Next chunk of the body, or `None` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError>;
}

/// Something that can open URLs.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Open `url` for streaming. Non-success statuses are errors.
    async fn open(&self, url: &str) -> Result<Box<dyn MediaBody>, FetchError>;

    /// Fetch `url` as text, for embed pages.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest-backed [`MediaSource`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Build a client with the given user agent and idle timeout.
    ///
    /// `timeout` bounds connecting and each individual read, not the
    /// whole transfer, so a large file that keeps arriving never times out.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot start.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        log::trace!("GET {} -> {}", url, status);
        Ok(response)
    }
}

#[async_trait]
impl MediaSource for HttpSource {
    async fn open(&self, url: &str) -> Result<Box<dyn MediaBody>, FetchError> {
        let response = self.get(url).await?;
        Ok(Box::new(HttpBody {
            url: url.to_string(),
            response,
        }))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

struct HttpBody {
    url: String,
    response: reqwest::Response,
}

#[async_trait]
impl MediaBody for HttpBody {
    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        self.response.chunk().await.map_err(|e| FetchError::Body {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}
