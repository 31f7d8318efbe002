//! Storage module for persisting audit data
//!
//! This module handles all database operations for the engine:
//! - SQLite database initialization and schema management
//! - The audit record (status, progress counters, scores)
//! - The per-audit crawl queue
//! - Crawled pages and check results

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{init_database, SqliteStorage};
pub use traits::{AuditStore, StorageError, StorageResult};

use crate::checks::{Category, CheckStatus, PageFacts, PageSummary, Priority};
use crate::scoring::AuditScores;
use crate::state::AuditStatus;
use crate::AuditError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between the engine, the scheduler and spawned batches
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, AuditError> {
    SqliteStorage::new(path)
}

/// Locks shared storage, mapping a poisoned lock to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Represents an audit in the database
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: i64,
    pub target_url: String,
    pub status: AuditStatus,
    pub config_hash: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Last time any progress was written; staleness is measured from here
    pub updated_at: DateTime<Utc>,
    pub batch_number: u32,
    pub batch_started_at: Option<DateTime<Utc>>,
    pub pages_discovered: u64,
    pub pages_crawled: u64,
    pub scores: Option<AuditScores>,
    pub error_message: Option<String>,
}

/// Represents one crawl queue entry
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub audit_id: i64,
    pub url: String,
    pub discovered_at: DateTime<Utc>,
    pub crawled_at: Option<DateTime<Utc>>,
}

/// A page about to be recorded
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub facts: PageFacts,
    /// HTML body, kept only for HTML pages
    pub html: Option<String>,
}

/// Represents a crawled page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub audit_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub facts: PageFacts,
    pub html: Option<String>,
    pub crawled_at: DateTime<Utc>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Returns the compact summary used by cross-page checks
    pub fn summary(&self) -> PageSummary {
        PageSummary {
            url: self.url.clone(),
            title: self.title.clone(),
            meta_description: self.meta_description.clone(),
        }
    }
}

/// A check result about to be recorded
#[derive(Debug, Clone)]
pub struct NewCheckResult {
    /// None for site-wide checks
    pub page_id: Option<i64>,
    pub check_name: String,
    pub category: Category,
    pub priority: Priority,
    pub status: CheckStatus,
    pub detail: Value,
}

/// Represents a check result in the database
#[derive(Debug, Clone)]
pub struct CheckResultRecord {
    pub id: i64,
    pub audit_id: i64,
    pub page_id: Option<i64>,
    pub check_name: String,
    pub category: Category,
    pub priority: Priority,
    pub status: CheckStatus,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

/// Serializes response headers for the `pages.headers` column
pub(crate) fn headers_to_json(headers: &BTreeMap<String, String>) -> String {
    serde_json::to_string(headers).unwrap_or_else(|_| "{}".to_string())
}

/// Parses the `pages.headers` column, tolerating legacy or empty values
pub(crate) fn headers_from_json(raw: &str) -> BTreeMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_json_roundtrip() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        let raw = headers_to_json(&headers);
        assert_eq!(headers_from_json(&raw), headers);
    }

    #[test]
    fn test_headers_from_garbage() {
        assert!(headers_from_json("not json").is_empty());
    }
}
