//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sumi-Audit database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per audit; the single source of truth for phase and progress
CREATE TABLE IF NOT EXISTS audits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_url TEXT NOT NULL,
    status TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    updated_at TEXT NOT NULL,
    batch_number INTEGER NOT NULL DEFAULT 0,
    batch_started_at TEXT,
    pages_discovered INTEGER NOT NULL DEFAULT 0,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    seo_score INTEGER,
    ai_readiness_score INTEGER,
    technical_score INTEGER,
    overall_score INTEGER,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_audits_status ON audits(status);

-- Durable crawl frontier, deduplicated by normalized URL
CREATE TABLE IF NOT EXISTS crawl_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    url TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    crawled_at TEXT,
    UNIQUE(audit_id, url)
);

CREATE INDEX IF NOT EXISTS idx_crawl_queue_pending ON crawl_queue(audit_id, crawled_at);

-- Crawled pages, append-only per URL
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    url TEXT NOT NULL,
    title TEXT,
    meta_description TEXT,
    status_code INTEGER,
    last_modified TEXT,
    content_type TEXT,
    is_resource INTEGER NOT NULL DEFAULT 0,
    response_time_ms INTEGER,
    headers TEXT NOT NULL DEFAULT '{}',
    html TEXT,
    fetch_error TEXT,
    crawled_at TEXT NOT NULL,
    checked_at TEXT,
    UNIQUE(audit_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_unchecked ON pages(audit_id, checked_at);

-- One row per (check, page) execution; page_id NULL for site-wide checks
CREATE TABLE IF NOT EXISTS check_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id INTEGER NOT NULL REFERENCES audits(id),
    page_id INTEGER REFERENCES pages(id),
    check_name TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    detail TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_check_results_audit ON check_results(audit_id, page_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["audits", "crawl_queue", "pages", "check_results"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
