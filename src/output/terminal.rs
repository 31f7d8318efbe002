//! Terminal printing of audit status and batch results

use crate::checks::Category;
use crate::engine::{AuditSnapshot, BatchReport};
use crate::scoring::AuditScores;
use crate::storage::AuditRecord;

/// Prints an audit snapshot to stdout
pub fn print_snapshot(snapshot: &AuditSnapshot) {
    let audit = &snapshot.audit;

    println!("=== Audit {} ===\n", audit.id);
    println!("Target: {}", audit.target_url);
    println!("Status: {}", audit.status);
    println!("Batches: {}", audit.batch_number);
    println!(
        "Pages: {} crawled, {} discovered, {} pending",
        audit.pages_crawled, audit.pages_discovered, snapshot.pending_urls
    );
    println!("Last progress: {}", audit.updated_at.to_rfc3339());
    if let Some(error) = &audit.error_message {
        println!("Error: {}", error);
    }
    println!();

    if let Some(scores) = &audit.scores {
        print_scores(scores);
    }

    if !snapshot.recent_results.is_empty() {
        println!("Recent Results:");
        for result in &snapshot.recent_results {
            let scope = match result.page_id {
                Some(page_id) => format!("page {}", page_id),
                None => "site".to_string(),
            };
            println!(
                "  {:<8} {:<20} ({})",
                result.status.to_string(),
                result.check_name,
                scope
            );
        }
        println!();
    }
}

/// Prints category and overall scores
pub fn print_scores(scores: &AuditScores) {
    println!("Scores:");
    for category in Category::ALL {
        println!("  {:<13} {:>3}", category.label(), scores.category(category));
    }
    println!("  {:<13} {:>3}", "Overall", scores.overall);
    println!();
}

/// Prints a one-batch summary
pub fn print_batch_report(report: &BatchReport) {
    println!(
        "Batch {} of audit {}: {} pages crawled, {} checks run, audit now {}",
        report.batch_number,
        report.audit_id,
        report.pages_crawled,
        report.checks_executed,
        report.status
    );

    if !report.fetch_errors.is_empty() {
        println!("Fetch Errors ({}):", report.fetch_errors.len());
        for failure in &report.fetch_errors {
            println!("  - {}: {}", failure.url, failure.error);
        }
    }
}

/// Prints one line per audit
pub fn print_audit_list(audits: &[AuditRecord]) {
    if audits.is_empty() {
        println!("No audits yet");
        return;
    }

    println!("{:>5}  {:<14} {:>7} {:>5}  {}", "ID", "Status", "Overall", "Pages", "Target");
    for audit in audits {
        let overall = audit
            .scores
            .map(|scores| scores.overall.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5}  {:<14} {:>7} {:>5}  {}",
            audit.id,
            audit.status.to_string(),
            overall,
            audit.pages_crawled,
            audit.target_url
        );
    }
}
