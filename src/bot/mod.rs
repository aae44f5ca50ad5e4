//! Telegram-facing services: inline answers, their cache and the upload sink.

pub mod inline;
pub mod query_cache;
pub mod uploader;

pub use inline::{handle_inline_query, InlineQueryService};
pub use query_cache::{InlineResult, InlineResults, QueryCache};
pub use uploader::TelegramUploader;
