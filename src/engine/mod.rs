//! Batch coordinator
//!
//! The engine owns the audit lifecycle: it creates audits, claims and runs
//! time-boxed batches, reconciles stale audits and handles stop requests.
//! All state lives in storage; an engine holds nothing an interrupted batch
//! could lose.
//!
//! ```text
//! pending -> crawling -> checking -> batch_complete -> crawling -> ...
//!                                 \-> completed
//! any in-progress status -> stopped | failed
//! ```

mod coordinator;

pub use coordinator::AuditEngine;

use crate::crawler::FetchFailure;
use crate::scoring::AuditScores;
use crate::state::AuditStatus;
use crate::storage::{AuditRecord, CheckResultRecord};

/// Number of recent check results included in a status snapshot
pub const RECENT_RESULTS_LIMIT: u32 = 20;

/// Summary of one executed batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub audit_id: i64,
    pub batch_number: u32,
    /// Pages fetched during this batch
    pub pages_crawled: u32,
    /// Check results written during this batch
    pub checks_executed: usize,
    /// The crawl budget ran out while URLs were still pending
    pub budget_exhausted: bool,
    pub fetch_errors: Vec<FetchFailure>,
    /// Status the audit was left in
    pub status: AuditStatus,
    pub scores: Option<AuditScores>,
}

/// Read-only projection served to pollers
#[derive(Debug, Clone)]
pub struct AuditSnapshot {
    pub audit: AuditRecord,
    /// Most recent results, newest first
    pub recent_results: Vec<CheckResultRecord>,
    /// URLs still waiting in the crawl queue
    pub pending_urls: u64,
}

/// What a staleness reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The audit was not stale, or another trigger got there first
    Unchanged,
    /// A stalled `crawling`/`checking` audit was marked failed
    Failed,
    /// A stalled `batch_complete` audit was claimed for its next batch
    Resumed { batch_number: u32 },
}
