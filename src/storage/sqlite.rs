//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the AuditStore trait.

use crate::checks::{Category, CheckStatus, PageFacts, Priority};
use crate::scoring::AuditScores;
use crate::state::AuditStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{AuditStore, StorageError, StorageResult};
use crate::storage::{
    headers_from_json, headers_to_json, AuditRecord, CheckResultRecord, NewCheckResult, NewPage,
    PageRecord, QueueEntry,
};
use crate::AuditError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const AUDIT_COLUMNS: &str = "id, target_url, status, config_hash, created_at, started_at,
     completed_at, updated_at, batch_number, batch_started_at, pages_discovered, pages_crawled,
     seo_score, ai_readiness_score, technical_score, overall_score, error_message";

const QUEUE_COLUMNS: &str = "id, audit_id, url, discovered_at, crawled_at";

const PAGE_COLUMNS: &str = "id, audit_id, url, title, meta_description, status_code,
     last_modified, content_type, is_resource, response_time_ms, headers, html, fetch_error,
     crawled_at, checked_at";

const RESULT_COLUMNS: &str =
    "id, audit_id, page_id, check_name, category, priority, status, detail, created_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(AuditError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = init_database(path)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Overwrites the progress heartbeat of an audit
    ///
    /// Used by operators to force reconciliation of a stuck audit.
    pub fn set_updated_at(&mut self, audit_id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE audits SET updated_at = ?1 WHERE id = ?2",
            params![format_timestamp(at), audit_id],
        )?;
        if changed == 0 {
            return Err(StorageError::AuditNotFound(audit_id));
        }
        Ok(())
    }
}

impl AuditStore for SqliteStorage {
    // ===== Audit Records =====

    fn create_audit(&mut self, target_url: &str, config_hash: &str) -> StorageResult<i64> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO audits (target_url, status, config_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![
                target_url,
                AuditStatus::Pending.to_db_string(),
                config_hash,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_audit(&self, audit_id: i64) -> StorageResult<AuditRecord> {
        let sql = format!("SELECT {} FROM audits WHERE id = ?1", AUDIT_COLUMNS);
        self.conn
            .query_row(&sql, params![audit_id], audit_from_row)
            .optional()?
            .ok_or(StorageError::AuditNotFound(audit_id))
    }

    fn get_status(&self, audit_id: i64) -> StorageResult<AuditStatus> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM audits WHERE id = ?1",
                params![audit_id],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or(StorageError::AuditNotFound(audit_id))?;
        AuditStatus::from_db_string(&raw)
            .ok_or_else(|| StorageError::Serialization(format!("Unknown audit status '{}'", raw)))
    }

    fn list_audits(&self, limit: u32) -> StorageResult<Vec<AuditRecord>> {
        let sql = format!(
            "SELECT {} FROM audits ORDER BY id DESC LIMIT ?1",
            AUDIT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let audits = stmt
            .query_map(params![limit], audit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(audits)
    }

    fn compare_and_set_status(
        &mut self,
        audit_id: i64,
        expected: &[AuditStatus],
        next: AuditStatus,
        error_message: Option<&str>,
    ) -> StorageResult<bool> {
        if expected.is_empty() {
            return Ok(false);
        }

        if let Some(from) = expected.iter().find(|from| !from.can_transition_to(next)) {
            return Err(StorageError::InvalidTransition {
                from: *from,
                to: next,
            });
        }

        let placeholders = (0..expected.len())
            .map(|i| format!("?{}", i + 6))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE audits SET status = ?1, updated_at = ?2,
                 completed_at = CASE WHEN ?3 THEN ?2 ELSE completed_at END,
                 error_message = COALESCE(?4, error_message)
             WHERE id = ?5 AND status IN ({})",
            placeholders
        );

        let mut values = vec![
            Value::Text(next.to_db_string().to_string()),
            Value::Text(now_timestamp()),
            Value::Integer(next.is_terminal() as i64),
            error_message
                .map(|m| Value::Text(m.to_string()))
                .unwrap_or(Value::Null),
            Value::Integer(audit_id),
        ];
        values.extend(
            expected
                .iter()
                .map(|s| Value::Text(s.to_db_string().to_string())),
        );

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed == 1)
    }

    fn claim_batch(&mut self, audit_id: i64) -> StorageResult<Option<u32>> {
        let now = now_timestamp();
        let changed = self.conn.execute(
            "UPDATE audits SET status = ?1, batch_number = batch_number + 1,
                 batch_started_at = ?2, started_at = COALESCE(started_at, ?2), updated_at = ?2
             WHERE id = ?3 AND status IN (?4, ?5)",
            params![
                AuditStatus::Crawling.to_db_string(),
                now,
                audit_id,
                AuditStatus::Pending.to_db_string(),
                AuditStatus::BatchComplete.to_db_string(),
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        let batch: u32 = self.conn.query_row(
            "SELECT batch_number FROM audits WHERE id = ?1",
            params![audit_id],
            |row| row.get(0),
        )?;
        Ok(Some(batch))
    }

    fn record_progress(&mut self, audit_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE audits SET
                 pages_discovered = (SELECT COUNT(*) FROM crawl_queue WHERE audit_id = ?1),
                 pages_crawled = (SELECT COUNT(*) FROM pages WHERE audit_id = ?1),
                 updated_at = ?2
             WHERE id = ?1",
            params![audit_id, now_timestamp()],
        )?;
        Ok(())
    }

    fn save_scores(&mut self, audit_id: i64, scores: &AuditScores) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE audits SET seo_score = ?1, ai_readiness_score = ?2, technical_score = ?3,
                 overall_score = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                scores.seo,
                scores.ai_readiness,
                scores.technical,
                scores.overall,
                now_timestamp(),
                audit_id
            ],
        )?;
        Ok(())
    }

    // ===== Crawl Queue =====

    fn enqueue_url(&mut self, audit_id: i64, url: &str) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO crawl_queue (audit_id, url, discovered_at) VALUES (?1, ?2, ?3)",
            params![audit_id, url, now_timestamp()],
        )?;
        Ok(inserted == 1)
    }

    fn pending_urls(&self, audit_id: i64, limit: u32) -> StorageResult<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM crawl_queue WHERE audit_id = ?1 AND crawled_at IS NULL
             ORDER BY id ASC LIMIT ?2",
            QUEUE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![audit_id, limit], queue_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn mark_crawled(&mut self, audit_id: i64, url: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE crawl_queue SET crawled_at = ?1
             WHERE audit_id = ?2 AND url = ?3 AND crawled_at IS NULL",
            params![now_timestamp(), audit_id, url],
        )?;
        Ok(changed == 1)
    }

    fn is_crawled(&self, audit_id: i64, url: &str) -> StorageResult<bool> {
        Ok(self
            .get_queue_entry(audit_id, url)?
            .map(|entry| entry.crawled_at.is_some())
            .unwrap_or(false))
    }

    fn get_queue_entry(&self, audit_id: i64, url: &str) -> StorageResult<Option<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM crawl_queue WHERE audit_id = ?1 AND url = ?2",
            QUEUE_COLUMNS
        );
        let entry = self
            .conn
            .query_row(&sql, params![audit_id, url], queue_entry_from_row)
            .optional()?;
        Ok(entry)
    }

    fn count_pending(&self, audit_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_queue WHERE audit_id = ?1 AND crawled_at IS NULL",
            params![audit_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_discovered(&self, audit_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_queue WHERE audit_id = ?1",
            params![audit_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Pages =====

    fn insert_page(&mut self, audit_id: i64, page: &NewPage) -> StorageResult<Option<i64>> {
        let facts = &page.facts;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO pages (audit_id, url, title, meta_description, status_code,
                 last_modified, content_type, is_resource, response_time_ms, headers, html,
                 fetch_error, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                audit_id,
                page.url,
                page.title,
                page.meta_description,
                facts.status_code,
                facts.last_modified,
                facts.content_type,
                facts.is_resource,
                facts.response_time_ms.map(|ms| ms as i64),
                headers_to_json(&facts.headers),
                page.html,
                facts.fetch_error,
                now_timestamp(),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS);
        self.conn
            .query_row(&sql, params![page_id], page_from_row)
            .optional()?
            .ok_or(StorageError::PageNotFound(page_id))
    }

    fn get_page_by_url(&self, audit_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE audit_id = ?1 AND url = ?2",
            PAGE_COLUMNS
        );
        let page = self
            .conn
            .query_row(&sql, params![audit_id, url], page_from_row)
            .optional()?;
        Ok(page)
    }

    fn list_pages(&self, audit_id: i64) -> StorageResult<Vec<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE audit_id = ?1 ORDER BY id ASC",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![audit_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn unchecked_pages(&self, audit_id: i64) -> StorageResult<Vec<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE audit_id = ?1 AND checked_at IS NULL ORDER BY id ASC",
            PAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let pages = stmt
            .query_map(params![audit_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn mark_page_checked(&mut self, page_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET checked_at = ?1 WHERE id = ?2 AND checked_at IS NULL",
            params![now_timestamp(), page_id],
        )?;
        Ok(())
    }

    fn count_pages(&self, audit_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE audit_id = ?1",
            params![audit_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Check Results =====

    fn insert_check_result(
        &mut self,
        audit_id: i64,
        result: &NewCheckResult,
    ) -> StorageResult<i64> {
        let detail = serde_json::to_string(&result.detail)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO check_results
                 (audit_id, page_id, check_name, category, priority, status, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                audit_id,
                result.page_id,
                result.check_name,
                result.category.to_db_string(),
                result.priority.to_db_string(),
                result.status.to_db_string(),
                detail,
                now_timestamp(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_check_results(&self, audit_id: i64) -> StorageResult<Vec<CheckResultRecord>> {
        let sql = format!(
            "SELECT {} FROM check_results WHERE audit_id = ?1 ORDER BY id ASC",
            RESULT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let results = stmt
            .query_map(params![audit_id], check_result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn recent_check_results(
        &self,
        audit_id: i64,
        limit: u32,
    ) -> StorageResult<Vec<CheckResultRecord>> {
        let sql = format!(
            "SELECT {} FROM check_results WHERE audit_id = ?1 ORDER BY id DESC LIMIT ?2",
            RESULT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let results = stmt
            .query_map(params![audit_id, limit], check_result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn executed_checks(
        &self,
        audit_id: i64,
        page_id: Option<i64>,
    ) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT check_name FROM check_results WHERE audit_id = ?1 AND page_id IS ?2",
        )?;
        let names = stmt
            .query_map(params![audit_id, page_id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }
}

/// Formats a timestamp the way every column in this database stores it
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(idx, &raw)
}

fn optional_timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp(idx, &s)).transpose()
}

fn audit_from_row(row: &Row) -> rusqlite::Result<AuditRecord> {
    let status_raw: String = row.get(2)?;
    let status = AuditStatus::from_db_string(&status_raw)
        .ok_or_else(|| conversion_error(2, format!("Unknown audit status '{}'", status_raw)))?;

    let seo: Option<u8> = row.get(12)?;
    let ai_readiness: Option<u8> = row.get(13)?;
    let technical: Option<u8> = row.get(14)?;
    let overall: Option<u8> = row.get(15)?;
    let scores = match (seo, ai_readiness, technical, overall) {
        (Some(seo), Some(ai_readiness), Some(technical), Some(overall)) => Some(AuditScores {
            seo,
            ai_readiness,
            technical,
            overall,
        }),
        _ => None,
    };

    Ok(AuditRecord {
        id: row.get(0)?,
        target_url: row.get(1)?,
        status,
        config_hash: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        started_at: optional_timestamp_column(row, 5)?,
        completed_at: optional_timestamp_column(row, 6)?,
        updated_at: timestamp_column(row, 7)?,
        batch_number: row.get(8)?,
        batch_started_at: optional_timestamp_column(row, 9)?,
        pages_discovered: row.get::<_, i64>(10)? as u64,
        pages_crawled: row.get::<_, i64>(11)? as u64,
        scores,
        error_message: row.get(16)?,
    })
}

fn queue_entry_from_row(row: &Row) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        audit_id: row.get(1)?,
        url: row.get(2)?,
        discovered_at: timestamp_column(row, 3)?,
        crawled_at: optional_timestamp_column(row, 4)?,
    })
}

fn page_from_row(row: &Row) -> rusqlite::Result<PageRecord> {
    let headers_raw: String = row.get(10)?;
    let facts = PageFacts {
        status_code: row.get(5)?,
        last_modified: row.get(6)?,
        content_type: row.get(7)?,
        is_resource: row.get(8)?,
        response_time_ms: row.get::<_, Option<i64>>(9)?.map(|ms| ms as u64),
        headers: headers_from_json(&headers_raw),
        fetch_error: row.get(12)?,
    };

    Ok(PageRecord {
        id: row.get(0)?,
        audit_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        meta_description: row.get(4)?,
        facts,
        html: row.get(11)?,
        crawled_at: timestamp_column(row, 13)?,
        checked_at: optional_timestamp_column(row, 14)?,
    })
}

fn check_result_from_row(row: &Row) -> rusqlite::Result<CheckResultRecord> {
    let category_raw: String = row.get(4)?;
    let priority_raw: String = row.get(5)?;
    let status_raw: String = row.get(6)?;
    let detail_raw: String = row.get(7)?;

    let category = Category::from_db_string(&category_raw)
        .ok_or_else(|| conversion_error(4, format!("Unknown category '{}'", category_raw)))?;
    let priority = Priority::from_db_string(&priority_raw)
        .ok_or_else(|| conversion_error(5, format!("Unknown priority '{}'", priority_raw)))?;
    let status = CheckStatus::from_db_string(&status_raw)
        .ok_or_else(|| conversion_error(6, format!("Unknown check status '{}'", status_raw)))?;
    let detail = serde_json::from_str(&detail_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(CheckResultRecord {
        id: row.get(0)?,
        audit_id: row.get(1)?,
        page_id: row.get(2)?,
        check_name: row.get(3)?,
        category,
        priority,
        status,
        detail,
        created_at: timestamp_column(row, 8)?,
    })
}

/// Initializes a new database at the given path
///
/// Creates all tables and indexes if they don't exist.
pub fn init_database(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;

    initialize_schema(&conn)?;

    Ok(conn)
}
