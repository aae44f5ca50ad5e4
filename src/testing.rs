//! Testing helpers shared by unit tests.

use crate::catalog::{AlbumRef, Author, SongRecord};
use crate::storage::JsonTokenStore;
use std::sync::Arc;
use tempfile::TempDir;

/// Minimal song whose media lives at `http://x/<slug>.mp3` in album `al1`.
#[must_use]
pub fn song(slug: &str) -> SongRecord {
    SongRecord {
        slug: slug.to_string(),
        name: Some(slug.to_uppercase()),
        authors: vec![Author {
            name: "Art".to_string(),
        }],
        album: Some(AlbumRef {
            slug: "al1".to_string(),
        }),
        file: format!("http://x/{slug}.mp3"),
        image_cropped: None,
        length: Some(180),
    }
}

/// Empty token store in a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the store is used.
pub async fn temp_store() -> (TempDir, Arc<JsonTokenStore>) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
    let store = JsonTokenStore::load(dir.path().join("file_ids.json")).await;
    (dir, Arc::new(store))
}
