//! Storage traits and error types
//!
//! This module defines the trait interface for the audit record store and
//! associated error types.

use crate::scoring::AuditScores;
use crate::state::AuditStatus;
use crate::storage::{
    AuditRecord, CheckResultRecord, NewCheckResult, NewPage, PageRecord, QueueEntry,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Audit not found: {0}")]
    AuditNotFound(i64),

    #[error("Page not found: {0}")]
    PageNotFound(i64),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: AuditStatus, to: AuditStatus },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for audit record store implementations
///
/// Every method is scoped by audit id. Status changes go through
/// conditional updates so racing triggers cannot both win.
pub trait AuditStore {
    // ===== Audit Records =====

    /// Creates a new audit in `pending` and returns its ID
    fn create_audit(&mut self, target_url: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets an audit by ID
    fn get_audit(&self, audit_id: i64) -> StorageResult<AuditRecord>;

    /// Gets just the status of an audit
    fn get_status(&self, audit_id: i64) -> StorageResult<AuditStatus>;

    /// Lists audits, newest first
    fn list_audits(&self, limit: u32) -> StorageResult<Vec<AuditRecord>>;

    /// Moves an audit to `next` only if its current status is in `expected`
    ///
    /// Returns `Ok(false)` when the status had already moved on. Entering a
    /// terminal status stamps `completed_at`; `error_message` is stored when
    /// given.
    fn compare_and_set_status(
        &mut self,
        audit_id: i64,
        expected: &[AuditStatus],
        next: AuditStatus,
        error_message: Option<&str>,
    ) -> StorageResult<bool>;

    /// Atomically claims the next batch: `pending|batch_complete -> crawling`
    ///
    /// Returns the new batch number, or `None` if the audit was not in a
    /// claimable status.
    fn claim_batch(&mut self, audit_id: i64) -> StorageResult<Option<u32>>;

    /// Refreshes the discovered/crawled counters and the progress heartbeat
    fn record_progress(&mut self, audit_id: i64) -> StorageResult<()>;

    /// Persists category and overall scores
    fn save_scores(&mut self, audit_id: i64, scores: &AuditScores) -> StorageResult<()>;

    // ===== Crawl Queue =====

    /// Adds a URL to the queue; returns false if it was already present
    fn enqueue_url(&mut self, audit_id: i64, url: &str) -> StorageResult<bool>;

    /// Oldest pending entries first (breadth-first order)
    fn pending_urls(&self, audit_id: i64, limit: u32) -> StorageResult<Vec<QueueEntry>>;

    /// Sets `crawled_at` if not already set; returns false if it was
    fn mark_crawled(&mut self, audit_id: i64, url: &str) -> StorageResult<bool>;

    /// Checks whether a URL has already been crawled
    fn is_crawled(&self, audit_id: i64, url: &str) -> StorageResult<bool>;

    /// Gets a queue entry by URL
    fn get_queue_entry(&self, audit_id: i64, url: &str) -> StorageResult<Option<QueueEntry>>;

    /// Counts entries not yet crawled
    fn count_pending(&self, audit_id: i64) -> StorageResult<u64>;

    /// Counts all queue entries
    fn count_discovered(&self, audit_id: i64) -> StorageResult<u64>;

    // ===== Pages =====

    /// Records a crawled page; returns None if the URL was already recorded
    fn insert_page(&mut self, audit_id: i64, page: &NewPage) -> StorageResult<Option<i64>>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Gets a page by URL
    fn get_page_by_url(&self, audit_id: i64, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Lists pages in crawl order
    fn list_pages(&self, audit_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Lists pages whose per-page checks have not all run yet
    fn unchecked_pages(&self, audit_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Marks all per-page checks for a page as executed
    fn mark_page_checked(&mut self, page_id: i64) -> StorageResult<()>;

    /// Counts crawled pages
    fn count_pages(&self, audit_id: i64) -> StorageResult<u64>;

    // ===== Check Results =====

    /// Appends one check result
    fn insert_check_result(
        &mut self,
        audit_id: i64,
        result: &NewCheckResult,
    ) -> StorageResult<i64>;

    /// Lists every result of an audit in insertion order
    fn list_check_results(&self, audit_id: i64) -> StorageResult<Vec<CheckResultRecord>>;

    /// Lists the most recent results, newest first
    fn recent_check_results(
        &self,
        audit_id: i64,
        limit: u32,
    ) -> StorageResult<Vec<CheckResultRecord>>;

    /// Names of checks already executed for a page (or site-wide when None)
    fn executed_checks(&self, audit_id: i64, page_id: Option<i64>)
        -> StorageResult<HashSet<String>>;
}
