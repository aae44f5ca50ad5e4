//! Bulk ingestion
//!
//! Walks the whole catalog once and resolves every song that has no stored
//! token yet, so later inline queries never pay upload latency.

use crate::catalog::{list_all, Catalog};
use crate::config::LISTING_PAGE_SIZE;
use crate::media::MediaResolver;
use futures_util::StreamExt;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that prevent an ingestion run from starting
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    /// Another run of the same job is in progress
    #[error("bulk ingestion is already running")]
    AlreadyRunning,
}

/// Outcome counters of one ingestion run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Songs read from the catalog
    pub seen: usize,
    /// Songs that already had a token
    pub skipped: usize,
    /// Songs uploaded during this run
    pub resolved: usize,
    /// Songs whose resolution failed
    pub failed: usize,
}

/// One-shot sweep over the catalog feeding the token store
pub struct BulkIngestion {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<MediaResolver>,
    page_size: u32,
    cancel: CancellationToken,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BulkIngestion {
    /// Create a job over the given catalog and resolver
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, resolver: Arc<MediaResolver>) -> Self {
        Self {
            catalog,
            resolver,
            page_size: LISTING_PAGE_SIZE,
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Override the listing page size
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Stop between songs once `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve every catalog song missing from the token store.
    ///
    /// Returns the number of songs uploaded by this run. Per-song failures
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::AlreadyRunning` if this job is already running.
    pub async fn run(&self) -> Result<usize, IngestError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(IngestError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        info!(page_size = self.page_size, "Bulk ingestion started");
        let report = self.ingest().await;
        info!(
            seen = report.seen,
            skipped = report.skipped,
            uploaded = report.resolved,
            failed = report.failed,
            "Bulk ingestion finished"
        );

        if report.seen == 0 {
            info!("No songs found in the catalog to upload");
        }
        Ok(report.resolved)
    }

    async fn ingest(&self) -> IngestReport {
        let mut report = IngestReport::default();
        let store = self.resolver.store();
        let mut songs = pin!(list_all(self.catalog.as_ref(), self.page_size));

        loop {
            if self.cancel.is_cancelled() {
                info!(seen = report.seen, "Bulk ingestion cancelled");
                break;
            }
            let Some(song) = songs.next().await else {
                break;
            };
            report.seen += 1;
            let index = report.seen;

            if store.get(&song.slug).await.is_some() {
                debug!(index, slug = %song.slug, "Song already uploaded");
                report.skipped += 1;
                continue;
            }

            info!(index, slug = %song.slug, "Uploading song");
            match self.resolver.resolve(&song).await {
                Ok(_) => {
                    report.resolved += 1;
                    info!(index, slug = %song.slug, "Uploaded and stored");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(index, slug = %song.slug, error = %e, "Failed to upload song");
                }
            }
        }

        report
    }
}
