#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use music_inline_bot::catalog::{
    AlbumRef, Author, Catalog, CatalogError, PageCursor, SongPage, SongRecord,
};
use music_inline_bot::media::{AudioUpload, AudioUploader, FetchError, MediaFetcher, UploadError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn song(slug: &str) -> SongRecord {
    SongRecord {
        slug: slug.to_string(),
        name: Some(slug.to_string()),
        authors: vec![Author {
            name: "Art".to_string(),
        }],
        album: Some(AlbumRef {
            slug: "al1".to_string(),
        }),
        file: format!("http://x/{slug}.mp3"),
        image_cropped: None,
        length: Some(100),
    }
}

/// Catalog serving fixed search results and a listing split into pages
pub struct FakeCatalog {
    pub search_results: Vec<SongRecord>,
    pub listing: Vec<SongRecord>,
    pub searches: AtomicUsize,
    pub pages: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(search_results: Vec<SongRecord>, listing: Vec<SongRecord>) -> Self {
        Self {
            search_results,
            listing,
            searches: AtomicUsize::new(0),
            pages: AtomicUsize::new(0),
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn search(&self, _query: &str, page_size: u32) -> Result<Vec<SongRecord>, CatalogError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .search_results
            .iter()
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn page(&self, cursor: &PageCursor) -> Result<SongPage, CatalogError> {
        self.pages.fetch_add(1, Ordering::SeqCst);
        let (offset, page_size) = match cursor {
            PageCursor::First { page_size } => (0, *page_size as usize),
            PageCursor::Next(url) => {
                let (offset, size) = url
                    .split_once(':')
                    .ok_or_else(|| CatalogError::Decode(url.clone()))?;
                (
                    offset.parse().map_err(|_| CatalogError::Decode(url.clone()))?,
                    size.parse().map_err(|_| CatalogError::Decode(url.clone()))?,
                )
            }
        };

        let end = (offset + page_size).min(self.listing.len());
        let next = (end < self.listing.len()).then(|| format!("{end}:{page_size}"));
        Ok(SongPage {
            results: self.listing[offset..end].to_vec(),
            next,
        })
    }
}

/// Media storage that answers 404 for configured URLs
#[derive(Default)]
pub struct FakeFetcher {
    pub missing: HashSet<String>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn missing(urls: &[&str]) -> Self {
        Self {
            missing: urls.iter().map(ToString::to_string).collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }
        if self.missing.contains(url) {
            return Err(FetchError::Status(404));
        }
        Ok(Bytes::from(url.to_string().into_bytes()))
    }
}

/// Upload sink issuing `tok-<slug>` tokens, optionally slowly
#[derive(Default)]
pub struct FakeUploader {
    pub delay: Option<Duration>,
    pub uploads: Mutex<Vec<AudioUpload>>,
    pub fixed_token: Option<String>,
}

impl FakeUploader {
    pub fn with_token(token: &str) -> Self {
        Self {
            fixed_token: Some(token.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.uploads.lock().map(|u| u.len()).unwrap_or_default()
    }

    pub fn uploads(&self) -> Vec<AudioUpload> {
        self.uploads
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AudioUploader for FakeUploader {
    async fn upload(&self, upload: AudioUpload) -> Result<String, UploadError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let token = self.fixed_token.clone().unwrap_or_else(|| {
            format!("tok-{}", upload.file_name.trim_end_matches(".mp3"))
        });
        self.uploads
            .lock()
            .map_err(|e| UploadError::Telegram(e.to_string()))?
            .push(upload);
        Ok(token)
    }
}
