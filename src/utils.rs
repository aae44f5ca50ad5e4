//! Utility functions shared by the catalog, resolver and Telegram layers.

use anyhow::Result;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Normalize a raw inline query before it is used as a cache key.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_string()
}

/// Join author names into a single performer string ("A, B").
#[must_use]
pub fn join_performers<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().collect::<Vec<_>>().join(", ")
}

/// Build the public link of a song inside its album page.
///
/// # Examples
///
/// ```
/// use music_inline_bot::utils::song_link;
///
/// assert_eq!(
///     song_link("https://example.org/", "al1", "abc"),
///     "https://example.org/music/albums/al1#abc"
/// );
/// ```
#[must_use]
pub fn song_link(site_url: &str, album_slug: &str, slug: &str) -> String {
    format!(
        "{}/music/albums/{album_slug}#{slug}",
        site_url.trim_end_matches('/')
    )
}

/// Truncate a string to a maximum number of characters, respecting char boundaries.
#[must_use]
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Creates an HTTP client for catalog and media requests.
///
/// Uses `HTTP_TIMEOUT_SECS` environment variable or the default timeout.
#[must_use]
pub fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(crate::config::get_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Returns the result of the first successful attempt,
/// or the last error if all attempts fail.
///
/// # Examples
///
/// ```no_run
/// use music_inline_bot::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn upload() -> Result<String> {
///     Ok("file-id".to_string())
/// }
///
/// # async fn example() -> Result<()> {
/// let file_id = retry_telegram_operation(|| async { upload().await }).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the last error once the retry budget is exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_normalize_query_trims() {
        assert_eq!(normalize_query("  blue \n"), "blue");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_join_performers() {
        assert_eq!(join_performers(["Art"]), "Art");
        assert_eq!(join_performers(["Art", "Bob"]), "Art, Bob");
        assert_eq!(join_performers(std::iter::empty()), "");
    }

    #[test]
    fn test_song_link_without_album() {
        assert_eq!(
            song_link("https://next.akarpov.ru", "", "abc"),
            "https://next.akarpov.ru/music/albums/#abc"
        );
    }

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_error() {
        let calls = AtomicUsize::new(0);
        let result = retry_telegram_operation(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(anyhow::anyhow!("transient"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    proptest! {
        #[test]
        fn normalize_query_is_idempotent(s in "\\PC*") {
            let once = normalize_query(&s);
            prop_assert_eq!(normalize_query(&once), once.clone());
            prop_assert_eq!(once.trim(), once.as_str());
        }

        #[test]
        fn song_link_ends_with_slug_fragment(
            album in "[a-z0-9-]{0,12}",
            slug in "[a-z0-9-]{1,12}"
        ) {
            let link = song_link("https://next.akarpov.ru/", &album, &slug);
            let expected_suffix = format!("/music/albums/{album}#{slug}");
            prop_assert!(link.ends_with(&expected_suffix));
            prop_assert!(!link.contains("ru//music"));
        }
    }
}
