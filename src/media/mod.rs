//! Media download and upload seams
//!
//! [`MediaFetcher`] downloads raw audio and cover bytes from media storage,
//! [`AudioUploader`] pushes them to the messaging platform. The
//! [`resolver`] combines both with the token store.

pub mod resolver;

pub use resolver::{MediaResolver, ResolveError};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client as HttpClient;
use thiserror::Error;

/// Errors that can occur while downloading media bytes
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-success HTTP status
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Errors returned by the messaging platform upload
#[derive(Error, Debug)]
pub enum UploadError {
    /// The platform rejected the upload or could not be reached
    #[error("Telegram upload failed: {0}")]
    Telegram(String),
    /// The acknowledgment carried no audio attachment
    #[error("upload acknowledgment has no audio attachment")]
    MissingAudio,
}

/// Audio plus metadata sent to the messaging platform
#[derive(Debug, Clone)]
pub struct AudioUpload {
    /// File name shown to users, `<slug>.mp3`
    pub file_name: String,
    /// Raw audio bytes
    pub audio: Bytes,
    /// Optional cover image bytes
    pub thumbnail: Option<Bytes>,
    /// Duration in seconds
    pub duration_secs: u32,
    /// Authors joined with ", "
    pub performer: String,
    /// Song title
    pub title: String,
    /// Link to the song on the public site
    pub caption: String,
}

/// Downloads raw bytes from media storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// GET `url` and return its body on HTTP 200
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Uploads audio to the messaging platform and returns its attachment token
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioUploader: Send + Sync {
    /// Upload one song; the returned token can be resent without re-uploading
    async fn upload(&self, upload: AudioUpload) -> Result<String, UploadError>;
}

/// Plain HTTP media storage client
pub struct HttpMediaFetcher {
    client: HttpClient,
}

impl HttpMediaFetcher {
    /// Create a fetcher with the standard HTTP timeout
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(crate::utils::create_http_client())
    }

    /// Create a fetcher reusing an existing HTTP client
    #[must_use]
    pub const fn with_client(client: HttpClient) -> Self {
        Self { client }
    }
}

impl Default for HttpMediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}
