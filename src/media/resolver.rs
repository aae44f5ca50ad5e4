//! Media resolver
//!
//! Turns a catalog song into a reusable attachment token: token store hit
//! first, otherwise download audio (and cover), upload once, remember the token.

use super::{AudioUpload, AudioUploader, FetchError, MediaFetcher, UploadError};
use crate::catalog::SongRecord;
use crate::storage::TokenStorage;
use bytes::Bytes;
use moka::future::Cache;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Errors that abort the resolution of one song
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Audio download failed; no token is produced
    #[error("media fetch failed for {slug}: {source}")]
    MediaFetch {
        /// Song slug
        slug: String,
        /// Underlying download error
        #[source]
        source: FetchError,
    },
    /// Messaging platform upload failed; no token is produced
    #[error("upload failed for {slug}: {source}")]
    Upload {
        /// Song slug
        slug: String,
        /// Underlying upload error
        #[source]
        source: UploadError,
    },
}

/// Resolves songs into attachment tokens, uploading each slug at most once
pub struct MediaResolver {
    store: Arc<dyn TokenStorage>,
    fetcher: Arc<dyn MediaFetcher>,
    uploader: Arc<dyn AudioUploader>,
    site_url: String,
    // One async lock per slug with a resolution in progress
    inflight: Cache<String, Arc<Mutex<()>>>,
}

impl MediaResolver {
    /// Create a resolver over a token store, media source and upload sink
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStorage>,
        fetcher: Arc<dyn MediaFetcher>,
        uploader: Arc<dyn AudioUploader>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            uploader,
            site_url: site_url.into(),
            inflight: Cache::builder().build(),
        }
    }

    /// Token store shared with other services
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStorage> {
        &self.store
    }

    /// Caption attached to the uploaded audio and to inline results
    #[must_use]
    pub fn caption(&self, song: &SongRecord) -> String {
        crate::utils::song_link(&self.site_url, song.album_slug(), &song.slug)
    }

    /// Resolve `song` into its attachment token.
    ///
    /// A stored token is returned without any network I/O. Concurrent calls
    /// for the same unresolved slug wait for each other, so only the first
    /// one downloads and uploads.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::MediaFetch` if the audio cannot be downloaded and
    /// `ResolveError::Upload` if the platform rejects the upload.
    #[instrument(skip_all, fields(slug = %song.slug))]
    pub async fn resolve(&self, song: &SongRecord) -> Result<String, ResolveError> {
        if let Some(token) = self.store.get(&song.slug).await {
            return Ok(token);
        }

        let lock = self
            .inflight
            .get_with(song.slug.clone(), async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        if let Some(token) = self.store.get(&song.slug).await {
            debug!("Token stored by a concurrent resolution");
            return Ok(token);
        }

        let result = self.fetch_and_upload(song).await;
        // Dropped while still held: waiters keep their clone and re-check the store
        self.inflight.invalidate(song.slug.as_str()).await;
        result
    }

    async fn fetch_and_upload(&self, song: &SongRecord) -> Result<String, ResolveError> {
        let audio = self
            .fetcher
            .fetch(&song.file)
            .await
            .map_err(|source| ResolveError::MediaFetch {
                slug: song.slug.clone(),
                source,
            })?;

        let thumbnail = self.fetch_thumbnail(song).await;

        let upload = AudioUpload {
            file_name: format!("{}.mp3", song.slug),
            audio,
            thumbnail,
            duration_secs: song.duration_secs(),
            performer: song.performer(),
            title: song.title().to_string(),
            caption: self.caption(song),
        };

        let token = self
            .uploader
            .upload(upload)
            .await
            .map_err(|source| ResolveError::Upload {
                slug: song.slug.clone(),
                source,
            })?;

        // The upload already happened; a failed write only loses durability
        if let Err(e) = self.store.put(&song.slug, &token).await {
            error!(error = %e, "Failed to persist token store");
        }

        info!("Song uploaded");
        Ok(token)
    }

    async fn fetch_thumbnail(&self, song: &SongRecord) -> Option<Bytes> {
        let url = song.thumbnail_url()?;
        match self.fetcher.fetch(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(url = %url, error = %e, "Thumbnail fetch failed, uploading without it");
                None
            }
        }
    }
}
