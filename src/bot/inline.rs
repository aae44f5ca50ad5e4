//! Inline query answering
//!
//! [`InlineQueryService`] turns a search string into an ordered list of
//! stored audio attachments; [`handle_inline_query`] is the teloxide endpoint.

use super::query_cache::{InlineResult, InlineResults, QueryCache};
use crate::catalog::Catalog;
use crate::config::SEARCH_PAGE_SIZE;
use crate::media::MediaResolver;
use crate::utils::normalize_query;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineQueryResult, InlineQueryResultCachedAudio};
use tracing::{debug, info, instrument, warn};

/// Answers inline queries from the query cache, the catalog and the resolver
pub struct InlineQueryService {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<MediaResolver>,
    cache: QueryCache,
    page_size: u32,
    cache_time: u32,
}

impl InlineQueryService {
    /// Create a service with the default search page size
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, resolver: Arc<MediaResolver>, cache: QueryCache) -> Self {
        Self {
            catalog,
            resolver,
            cache,
            page_size: SEARCH_PAGE_SIZE,
            cache_time: crate::config::INLINE_CACHE_TIME_SECS,
        }
    }

    /// Set the freshness hint (seconds) sent along with answers
    #[must_use]
    pub const fn with_cache_time(mut self, cache_time: u32) -> Self {
        self.cache_time = cache_time;
        self
    }

    /// Freshness hint for the transport
    #[must_use]
    pub const fn cache_time(&self) -> u32 {
        self.cache_time
    }

    /// Answer one query.
    ///
    /// Never fails: songs that cannot be resolved are dropped and a failed
    /// catalog search yields an empty answer. First-time songs are uploaded
    /// on the way, so a cold query may take a while.
    ///
    /// An empty answer caused by a failed search is deliberately kept out of
    /// the query cache so the next keystroke asks the catalog again; an empty
    /// but successful search is cached like any other answer.
    #[instrument(skip(self))]
    pub async fn answer(&self, query: &str) -> InlineResults {
        let query = normalize_query(query);

        if let Some(results) = self.cache.get(&query).await {
            debug!(results = results.len(), "Query cache hit");
            return results;
        }

        let songs = match self.catalog.search(&query, self.page_size).await {
            Ok(songs) => songs,
            Err(e) => {
                // Not cached: the next keystroke retries the catalog
                warn!(error = %e, "Catalog search failed");
                return Arc::new(Vec::new());
            }
        };

        let mut results = Vec::with_capacity(songs.len());
        for song in &songs {
            match self.resolver.resolve(song).await {
                Ok(token) => results.push(InlineResult {
                    slug: song.slug.clone(),
                    token,
                    caption: self.resolver.caption(song),
                }),
                Err(e) => warn!(slug = %song.slug, error = %e, "Dropping unresolvable song"),
            }
        }

        info!(
            found = songs.len(),
            resolved = results.len(),
            "Answered query from catalog"
        );
        self.cache.put(query, results).await
    }
}

fn to_telegram_result(result: &InlineResult) -> InlineQueryResult {
    InlineQueryResult::CachedAudio(
        InlineQueryResultCachedAudio::new(result.slug.clone(), FileId(result.token.clone()))
            .caption(result.caption.clone()),
    )
}

/// Handle an inline query update
///
/// # Errors
///
/// Returns a `RequestError` if Telegram rejects the answer.
pub async fn handle_inline_query(
    bot: Bot,
    q: InlineQuery,
    service: Arc<InlineQueryService>,
) -> ResponseResult<()> {
    let results = service.answer(&q.query).await;
    let items: Vec<InlineQueryResult> = results.iter().map(to_telegram_result).collect();

    bot.answer_inline_query(q.id, items)
        .cache_time(service.cache_time())
        .await?;
    Ok(())
}
