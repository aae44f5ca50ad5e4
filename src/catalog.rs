//! Catalog client
//!
//! Wraps the remote song catalog API: single-page search for inline queries
//! and a lazy, cursor-following listing for bulk ingestion.

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while talking to the catalog API
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Connection, timeout or body read failure
    #[error("Catalog transport error: {0}")]
    Transport(String),
    /// Non-success HTTP status
    #[error("Catalog API returned status {0}")]
    Status(u16),
    /// Response body is not a valid song page
    #[error("Catalog decode error: {0}")]
    Decode(String),
}

/// A song author as returned by the catalog
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Author {
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Album reference embedded in a song record
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AlbumRef {
    /// Album slug used in public links
    #[serde(default)]
    pub slug: String,
}

/// Snapshot of a catalog song
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SongRecord {
    /// Stable unique identifier
    pub slug: String,
    /// Display title
    #[serde(default)]
    pub name: Option<String>,
    /// Performers
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<Author>,
    /// Owning album
    #[serde(default)]
    pub album: Option<AlbumRef>,
    /// Media file URL
    pub file: String,
    /// Optional cropped cover URL
    #[serde(default)]
    pub image_cropped: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub length: Option<u32>,
}

impl SongRecord {
    /// Title, falling back to a placeholder for untitled songs
    #[must_use]
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Title")
    }

    /// Slug of the album, empty when the song has none
    #[must_use]
    pub fn album_slug(&self) -> &str {
        self.album.as_ref().map_or("", |a| a.slug.as_str())
    }

    /// Authors joined as "A, B"
    #[must_use]
    pub fn performer(&self) -> String {
        crate::utils::join_performers(self.authors.iter().map(|a| a.name.as_str()))
    }

    /// Duration in seconds, zero when unknown
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.length.unwrap_or(0)
    }

    /// Thumbnail URL if present and non-empty
    #[must_use]
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.image_cropped.as_deref().filter(|u| !u.is_empty())
    }
}

/// One page of catalog results
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SongPage {
    /// Songs on this page; undecodable entries are skipped
    #[serde(default, deserialize_with = "skip_invalid_songs")]
    pub results: Vec<SongRecord>,
    /// Absolute URL of the next page, if any
    #[serde(default)]
    pub next: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// One malformed song must not cost the rest of the page
fn skip_invalid_songs<'de, D>(deserializer: D) -> Result<Vec<SongRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = null_as_default(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let slug = value
                .get("slug")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<unknown>")
                .to_string();
            match serde_json::from_value::<SongRecord>(value) {
                Ok(song) => Some(song),
                Err(e) => {
                    warn!(slug = %slug, error = %e, "Skipping undecodable catalog song");
                    None
                }
            }
        })
        .collect())
}

/// Position in a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page of the full listing
    First {
        /// Songs per page
        page_size: u32,
    },
    /// Follow-up page URL returned by the API
    Next(String),
}

/// Interface to the remote song catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search songs matching `query`, returning at most one page
    async fn search(&self, query: &str, page_size: u32) -> Result<Vec<SongRecord>, CatalogError>;
    /// Fetch one page of the full listing
    async fn page(&self, cursor: &PageCursor) -> Result<SongPage, CatalogError>;
}

/// Lazily walk the whole catalog, following `next` links until exhausted.
///
/// Every call starts again from the first page. A failed page is logged and
/// ends the stream; songs already yielded stay valid.
pub fn list_all(catalog: &dyn Catalog, page_size: u32) -> impl Stream<Item = SongRecord> + Send + '_ {
    stream::unfold(Some(PageCursor::First { page_size }), move |cursor| async move {
        let cursor = cursor?;
        match catalog.page(&cursor).await {
            Ok(page) => {
                debug!(
                    cursor = ?cursor,
                    songs = page.results.len(),
                    has_next = page.next.is_some(),
                    "Fetched catalog page"
                );
                let next = page.next.map(PageCursor::Next);
                Some((stream::iter(page.results), next))
            }
            Err(e) => {
                warn!(cursor = ?cursor, error = %e, "Catalog listing stopped early");
                None
            }
        }
    })
    .flatten()
}

/// HTTP implementation of [`Catalog`]
pub struct HttpCatalog {
    client: HttpClient,
    base_url: String,
}

impl HttpCatalog {
    /// Create a catalog client for the song listing endpoint
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(crate::utils::create_http_client(), base_url)
    }

    /// Create a catalog client reusing an existing HTTP client
    #[must_use]
    pub fn with_client(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_page(&self, request: reqwest::RequestBuilder) -> Result<SongPage, CatalogError> {
        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| {
            CatalogError::Decode(format!(
                "{e} (body: {})",
                crate::utils::truncate_str(String::from_utf8_lossy(&body), 200)
            ))
        })
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn search(&self, query: &str, page_size: u32) -> Result<Vec<SongRecord>, CatalogError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("search", query)])
            .query(&[("page_size", page_size)]);
        Ok(self.get_page(request).await?.results)
    }

    async fn page(&self, cursor: &PageCursor) -> Result<SongPage, CatalogError> {
        let request = match cursor {
            PageCursor::First { page_size } => self
                .client
                .get(&self.base_url)
                .query(&[("page_size", *page_size)]),
            PageCursor::Next(url) => self.client.get(url),
        };
        self.get_page(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::song;

    #[test]
    fn test_song_record_full_payload() {
        let json = r#"{
            "slug": "abc",
            "file": "http://x/a.mp3",
            "length": 215,
            "authors": [{"name": "Art", "slug": "art"}, {"name": "Bob"}],
            "name": "Blue",
            "album": {"name": "First", "slug": "al1"},
            "image_cropped": "http://x/a.jpg",
            "played": 12
        }"#;

        let song: SongRecord = serde_json::from_str(json).expect("valid song");
        assert_eq!(song.slug, "abc");
        assert_eq!(song.title(), "Blue");
        assert_eq!(song.performer(), "Art, Bob");
        assert_eq!(song.album_slug(), "al1");
        assert_eq!(song.duration_secs(), 215);
        assert_eq!(song.thumbnail_url(), Some("http://x/a.jpg"));
    }

    #[test]
    fn test_song_record_missing_optional_fields() {
        let json = r#"{"slug": "abc", "file": "http://x/a.mp3", "album": null, "image_cropped": null}"#;

        let song: SongRecord = serde_json::from_str(json).expect("valid song");
        assert_eq!(song.title(), "Unknown Title");
        assert_eq!(song.performer(), "");
        assert_eq!(song.album_slug(), "");
        assert_eq!(song.duration_secs(), 0);
        assert_eq!(song.thumbnail_url(), None);
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let json = r#"{"slug": "abc", "file": "http://x/a.mp3", "authors": null, "name": null, "length": null}"#;

        let song: SongRecord = serde_json::from_str(json).expect("valid song");
        assert_eq!(song.performer(), "");
        assert_eq!(song.title(), "Unknown Title");
        assert_eq!(song.duration_secs(), 0);
    }

    #[test]
    fn test_page_skips_malformed_song() {
        let json = r#"{
            "results": [
                {"slug": "a", "file": "http://x/a.mp3"},
                {"slug": "broken", "file": null},
                {"slug": "c", "file": "http://x/c.mp3", "authors": null}
            ],
            "next": "http://api/songs?page=2"
        }"#;

        let page: SongPage = serde_json::from_str(json).expect("valid page");
        let slugs: Vec<&str> = page.results.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "c"]);
        assert_eq!(page.next.as_deref(), Some("http://api/songs?page=2"));
    }

    #[test]
    fn test_page_with_null_results() {
        let page: SongPage =
            serde_json::from_str(r#"{"results": null, "next": null}"#).expect("valid page");
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_page_without_next() {
        let page: SongPage = serde_json::from_str(r#"{"results": []}"#).expect("valid page");
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_list_all_follows_cursor() {
        let mut catalog = MockCatalog::new();
        catalog.expect_page().times(2).returning(|cursor| match cursor {
            PageCursor::First { page_size } => {
                assert_eq!(*page_size, 2);
                Ok(SongPage {
                    results: vec![song("a"), song("b")],
                    next: Some("http://api/songs?page=2".to_string()),
                })
            }
            PageCursor::Next(url) => {
                assert_eq!(url, "http://api/songs?page=2");
                Ok(SongPage {
                    results: vec![song("c")],
                    next: None,
                })
            }
        });

        let slugs: Vec<String> = list_all(&catalog, 2).map(|s| s.slug).collect().await;
        assert_eq!(slugs, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_all_stops_on_error() {
        let mut catalog = MockCatalog::new();
        catalog.expect_page().times(2).returning(|cursor| match cursor {
            PageCursor::First { .. } => Ok(SongPage {
                results: vec![song("a")],
                next: Some("http://api/songs?page=2".to_string()),
            }),
            PageCursor::Next(_) => Err(CatalogError::Status(502)),
        });

        let slugs: Vec<String> = list_all(&catalog, 1000).map(|s| s.slug).collect().await;
        assert_eq!(slugs, vec!["a"]);
    }

    #[tokio::test]
    async fn test_list_all_is_restartable() {
        let mut catalog = MockCatalog::new();
        catalog.expect_page().times(2).returning(|_| {
            Ok(SongPage {
                results: vec![song("a")],
                next: None,
            })
        });

        let first: Vec<SongRecord> = list_all(&catalog, 10).collect().await;
        let second: Vec<SongRecord> = list_all(&catalog, 10).collect().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_all_is_lazy() {
        let mut catalog = MockCatalog::new();
        catalog.expect_page().times(1).returning(|_| {
            Ok(SongPage {
                results: vec![song("a")],
                next: Some("http://api/songs?page=2".to_string()),
            })
        });

        let first = list_all(&catalog, 10).boxed().next().await;
        assert_eq!(first.map(|s| s.slug), Some("a".to_string()));
    }
}
