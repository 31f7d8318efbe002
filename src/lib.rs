//! Sumi-Audit: a site audit engine
//!
//! This crate crawls a single website within bounded batches, runs a fixed
//! registry of SEO, AI-readiness and technical checks against what it finds,
//! and reduces the results into category and overall scores. An audit can
//! span several batches; progress lives in SQLite so any batch can pick up
//! where the last one stopped.

pub mod checks;
pub mod config;
pub mod crawler;
pub mod engine;
pub mod output;
pub mod robots;
pub mod scoring;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Audit {0} not found")]
    AuditNotFound(i64),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: state::AuditStatus,
        to: state::AuditStatus,
    },

    #[error("Audit {audit_id} cannot be continued while {status}")]
    NotContinuable {
        audit_id: i64,
        status: state::AuditStatus,
    },

    #[error("Audit {audit_id} cannot be stopped while {status}")]
    NotCancelable {
        audit_id: i64,
        status: state::AuditStatus,
    },

    #[error("Audit {audit_id} lost a race for status {expected}")]
    StatusConflict {
        audit_id: i64,
        expected: state::AuditStatus,
    },

    #[error("No async runtime available to launch a batch")]
    NoRuntime,
}

impl From<storage::StorageError> for AuditError {
    fn from(e: storage::StorageError) -> Self {
        match e {
            storage::StorageError::AuditNotFound(audit_id) => Self::AuditNotFound(audit_id),
            storage::StorageError::InvalidTransition { from, to } => {
                Self::InvalidTransition { from, to }
            }
            other => Self::Storage(other),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{AuditEngine, AuditSnapshot, BatchReport, Reconciliation};
pub use scoring::{score_results, AuditScores};
pub use state::AuditStatus;
pub use url::{normalize_url, same_site};
