//! Short-lived cache of assembled inline query answers
//!
//! Keeps the last answered queries in memory so repeated keystrokes and
//! popular searches are served without touching the catalog.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::time::Duration;

/// One selectable inline result: a stored audio attachment plus its caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineResult {
    /// Song slug, used as the inline result id
    pub slug: String,
    /// Attachment token of the uploaded audio
    pub token: String,
    /// Link to the song on the public site
    pub caption: String,
}

/// Ordered answer to one query
pub type InlineResults = Arc<Vec<InlineResult>>;

/// TTL- and capacity-bounded query -> results cache
///
/// Entries expire a fixed time after insertion; when full, the least
/// recently used query is evicted.
#[derive(Clone)]
pub struct QueryCache {
    cache: Cache<String, InlineResults>,
}

impl QueryCache {
    /// Creates a new `QueryCache`
    ///
    /// # Examples
    ///
    /// ```
    /// use music_inline_bot::bot::QueryCache;
    /// use std::time::Duration;
    ///
    /// let cache = QueryCache::new(Duration::from_secs(600), 100);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self { cache }
    }

    /// Cached results for a normalized query, `None` on miss or expiry
    pub async fn get(&self, query: &str) -> Option<InlineResults> {
        self.cache.get(query).await
    }

    /// Store results for a normalized query, replacing any previous entry
    pub async fn put(&self, query: String, results: Vec<InlineResult>) -> InlineResults {
        let results = Arc::new(results);
        self.cache.insert(query, Arc::clone(&results)).await;
        results
    }

    /// Returns the current number of entries in the cache
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
