//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! tunable constants for caches, HTTP and Telegram retries.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub bot_token: String,

    /// Private chat that receives uploads; its audio `file_id`s become attachment tokens
    pub upload_chat_id: i64,

    /// Song listing endpoint of the catalog API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Public site used when building captions
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Run bulk ingestion of the whole catalog at startup
    #[serde(default)]
    pub upload_songs: bool,

    /// Path of the persisted slug -> attachment token mapping
    #[serde(default = "default_file_ids_path")]
    pub file_ids_path: String,
}

fn default_api_base_url() -> String {
    "https://new.akarpov.ru/api/v1/music/song/".to_string()
}

fn default_site_url() -> String {
    "https://next.akarpov.ru".to_string()
}

fn default_file_ids_path() -> String {
    "file_ids.json".to_string()
}

/// Build the layered configuration shared by every settings struct.
///
/// # Errors
///
/// Returns a `ConfigError` if a source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        // Start off by merging in the "default" configuration file
        .add_source(File::with_name("config/default").required(false))
        // Add in the current environment file
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__UPLOAD_SONGS=true ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Bare env vars; UPPER_SNAKE_CASE maps to snake_case, empty values are unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use music_inline_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }
}

/// Results requested per inline search.
pub const SEARCH_PAGE_SIZE: u32 = 5;
/// Page size used when walking the whole catalog.
pub const LISTING_PAGE_SIZE: u32 = 1000;

/// Lifetime (seconds) of a cached inline query answer.
pub const QUERY_CACHE_TTL_SECS: u64 = 600;
/// Maximum number of distinct queries kept in the query cache.
pub const QUERY_CACHE_MAX_SIZE: u64 = 100;
/// Freshness hint (seconds) Telegram may cache an inline answer for.
pub const INLINE_CACHE_TIME_SECS: u32 = 1;
/// Timeout for catalog and media HTTP requests.
pub const HTTP_TIMEOUT_SECS: u64 = 120;

/// Initial delay for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for a single Telegram API retry delay
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 10_000;
/// Number of retries after the first failed Telegram API call
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Get query cache TTL from env or default.
///
/// Environment variable: `QUERY_CACHE_TTL_SECS`.
#[must_use]
pub fn get_query_cache_ttl() -> u64 {
    env_or("QUERY_CACHE_TTL_SECS", QUERY_CACHE_TTL_SECS)
}

/// Get query cache capacity from env or default.
///
/// Environment variable: `QUERY_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_query_cache_max_size() -> u64 {
    env_or("QUERY_CACHE_MAX_SIZE", QUERY_CACHE_MAX_SIZE)
}

/// Get the inline answer freshness hint from env or default.
///
/// Environment variable: `INLINE_CACHE_TIME_SECS`.
#[must_use]
pub fn get_inline_cache_time() -> u32 {
    env_or("INLINE_CACHE_TIME_SECS", INLINE_CACHE_TIME_SECS)
}

/// Get HTTP timeout from env or default.
///
/// Environment variable: `HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_http_timeout_secs() -> u64 {
    env_or("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)
}
