//! Output module for audit reports and status display
//!
//! This module handles:
//! - Rendering markdown audit reports
//! - Writing reports to the configured report directory
//! - Printing audit status, audit lists and batch summaries to the terminal

mod markdown;
mod terminal;

pub use markdown::{format_scores_table, render_report, write_report};
pub use terminal::{print_audit_list, print_batch_report, print_scores, print_snapshot};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
