#![deny(missing_docs)]
//! Music inline bot library.
//!
//! Resolves catalog songs into reusable Telegram audio attachments, caches
//! them on disk, and answers inline queries from a short-lived result cache.

/// Telegram-facing services: inline queries, query cache, uploads.
pub mod bot;
/// Remote song catalog client.
pub mod catalog;
/// Configuration management.
pub mod config;
/// Bulk ingestion of the whole catalog.
pub mod ingest;
/// Media download and resolution into attachment tokens.
pub mod media;
/// Durable slug to attachment token store.
pub mod storage;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
