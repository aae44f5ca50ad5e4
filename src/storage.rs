//! Storage layer for attachment tokens
//!
//! Provides a durable slug -> attachment token mapping persisted as a single
//! JSON object, rewritten in full on every insertion.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface for attachment token stores
///
/// Entries are write-once: a slug that already has a token keeps it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Get the attachment token of a slug
    async fn get(&self, slug: &str) -> Option<String>;
    /// Store a token and persist the mapping before returning
    async fn put(&self, slug: &str, token: &str) -> Result<(), StorageError>;
    /// Number of stored tokens
    fn len(&self) -> usize;
    /// Whether the store has no tokens
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// JSON-file-backed token store
pub struct JsonTokenStore {
    path: PathBuf,
    tokens: RwLock<BTreeMap<String, String>>,
    // Serializes snapshot + write so the newest mapping always lands last
    write_lock: Mutex<()>,
}

impl JsonTokenStore {
    /// Load the store from `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tokens = match tokio::fs::read(&path).await {
            Ok(data) => match serde_json::from_slice::<BTreeMap<String, String>>(&data) {
                Ok(tokens) => {
                    info!(path = %path.display(), tokens = tokens.len(), "Token store loaded");
                    tokens
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Token store file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No token store file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Token store file is unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Self::from_map(path, tokens)
    }

    /// Create a store with an initial mapping without touching the disk
    #[must_use]
    pub fn from_map(path: impl Into<PathBuf>, tokens: BTreeMap<String, String>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(tokens),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current mapping
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn persist(&self, body: Vec<u8>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for JsonTokenStore {
    async fn get(&self, slug: &str) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slug)
            .cloned()
    }

    async fn put(&self, slug: &str, token: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let body = {
            let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = tokens.get(slug) {
                if existing != token {
                    debug!(slug = %slug, "Token already stored for slug, keeping the first one");
                }
                return Ok(());
            }
            tokens.insert(slug.to_string(), token.to_string());
            serde_json::to_vec(&*tokens)?
        };

        self.persist(body).await
    }

    fn len(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
