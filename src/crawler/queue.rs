//! Durable crawl frontier for one audit
//!
//! The queue lives in the `crawl_queue` table, so a batch that dies leaves
//! nothing behind in memory and the next batch picks up the same frontier.
//! Entries are keyed by normalized URL and are never removed; crawling an
//! entry only stamps its `crawled_at`.

use crate::storage::{lock, AuditStore, QueueEntry, SharedStorage, StorageResult};
use crate::url::normalize_url;
use url::Url;

/// Crawl queue handle scoped to one audit
#[derive(Clone)]
pub struct CrawlQueue {
    storage: SharedStorage,
    audit_id: i64,
}

impl CrawlQueue {
    pub fn new(storage: SharedStorage, audit_id: i64) -> Self {
        Self { storage, audit_id }
    }

    pub fn audit_id(&self) -> i64 {
        self.audit_id
    }

    /// Normalizes a raw URL and enqueues it
    ///
    /// # Returns
    ///
    /// * `Ok(Some(true))` - The URL was new
    /// * `Ok(Some(false))` - The URL was already queued
    /// * `Ok(None)` - The URL could not be normalized
    pub fn push_raw(&self, raw: &str) -> StorageResult<Option<bool>> {
        match normalize_url(raw) {
            Ok(url) => self.push(&url).map(Some),
            Err(e) => {
                tracing::debug!("Skipping unnormalizable URL {}: {}", raw, e);
                Ok(None)
            }
        }
    }

    /// Enqueues an already-normalized URL; returns false if already present
    pub fn push(&self, url: &Url) -> StorageResult<bool> {
        lock(&self.storage)?.enqueue_url(self.audit_id, url.as_str())
    }

    /// Oldest pending entries, up to `limit`
    pub fn next_batch(&self, limit: u32) -> StorageResult<Vec<QueueEntry>> {
        lock(&self.storage)?.pending_urls(self.audit_id, limit)
    }

    /// Marks a URL crawled; returns false if it already was
    pub fn complete(&self, url: &str) -> StorageResult<bool> {
        lock(&self.storage)?.mark_crawled(self.audit_id, url)
    }

    pub fn is_crawled(&self, url: &str) -> StorageResult<bool> {
        lock(&self.storage)?.is_crawled(self.audit_id, url)
    }

    /// Number of URLs still waiting to be crawled
    pub fn pending(&self) -> StorageResult<u64> {
        lock(&self.storage)?.count_pending(self.audit_id)
    }
}
