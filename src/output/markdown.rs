//! Markdown audit report generation
//!
//! This module renders a human-readable report of an audit: its metadata,
//! category scores, and the failing or warning checks grouped by category
//! and priority.

use crate::checks::{Category, CheckStatus, Priority};
use crate::engine::AuditSnapshot;
use crate::output::OutputResult;
use crate::scoring::AuditScores;
use crate::storage::CheckResultRecord;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-check counts of problem results
#[derive(Debug, Default)]
struct Finding {
    site_wide: bool,
    failed: u64,
    warning: u64,
}

/// Writes the report for an audit to `report_dir/audit-<id>.md`
///
/// # Arguments
///
/// * `snapshot` - The audit snapshot
/// * `results` - Every check result of the audit
/// * `report_dir` - Directory to write into; created if missing
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_report(
    snapshot: &AuditSnapshot,
    results: &[CheckResultRecord],
    report_dir: &Path,
) -> OutputResult<PathBuf> {
    fs::create_dir_all(report_dir)?;
    let path = report_dir.join(format!("audit-{}.md", snapshot.audit.id));
    fs::write(&path, render_report(snapshot, results))?;
    Ok(path)
}

/// Formats an audit report as markdown
pub fn render_report(snapshot: &AuditSnapshot, results: &[CheckResultRecord]) -> String {
    let audit = &snapshot.audit;
    let mut md = String::new();

    md.push_str(&format!("# Site Audit: {}\n\n", audit.target_url));

    // Audit metadata
    md.push_str("## Audit Information\n\n");
    md.push_str(&format!("- **Audit ID**: {}\n", audit.id));
    md.push_str(&format!("- **Status**: {}\n", audit.status));
    md.push_str(&format!("- **Created**: {}\n", audit.created_at.to_rfc3339()));
    if let Some(completed) = audit.completed_at {
        md.push_str(&format!("- **Finished**: {}\n", completed.to_rfc3339()));
    }
    md.push_str(&format!("- **Batches**: {}\n", audit.batch_number));
    md.push_str(&format!(
        "- **Pages Crawled**: {} of {} discovered ({} pending)\n",
        audit.pages_crawled, audit.pages_discovered, snapshot.pending_urls
    ));
    md.push_str(&format!("- **Config Hash**: {}\n", audit.config_hash));
    if let Some(error) = &audit.error_message {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push('\n');

    // Scores
    md.push_str("## Scores\n\n");
    match &audit.scores {
        Some(scores) => md.push_str(&format_scores_table(scores)),
        None => md.push_str("_Scores are not available yet._\n"),
    }
    md.push('\n');

    // Result totals
    let count = |status: CheckStatus| results.iter().filter(|r| r.status == status).count();
    md.push_str("## Check Summary\n\n");
    md.push_str(&format!("- **Results**: {}\n", results.len()));
    md.push_str(&format!("- **Passed**: {}\n", count(CheckStatus::Passed)));
    md.push_str(&format!("- **Warnings**: {}\n", count(CheckStatus::Warning)));
    md.push_str(&format!("- **Failed**: {}\n\n", count(CheckStatus::Failed)));

    // Findings
    md.push_str("## Findings\n\n");
    let findings = collect_findings(results);
    if findings.is_empty() {
        md.push_str("No issues found.\n");
        return md;
    }

    for category in Category::ALL {
        let in_category: Vec<_> = findings
            .iter()
            .filter(|((c, _, _), _)| *c == category)
            .collect();
        if in_category.is_empty() {
            continue;
        }

        md.push_str(&format!("### {}\n\n", category.label()));
        for priority in [Priority::Critical, Priority::Recommended, Priority::Optional] {
            let rows: Vec<_> = in_category
                .iter()
                .filter(|((_, p, _), _)| *p == priority)
                .collect();
            if rows.is_empty() {
                continue;
            }

            md.push_str(&format!("#### {}\n\n", capitalize(priority.to_db_string())));
            md.push_str("| Check | Scope | Failed | Warnings |\n");
            md.push_str("|-------|-------|--------|----------|\n");
            for ((_, _, name), finding) in rows {
                let scope = if finding.site_wide { "site" } else { "page" };
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    name, scope, finding.failed, finding.warning
                ));
            }
            md.push('\n');
        }
    }

    md
}

/// Formats category and overall scores as a markdown table
pub fn format_scores_table(scores: &AuditScores) -> String {
    let mut md = String::new();
    md.push_str("| Category | Score |\n");
    md.push_str("|----------|-------|\n");
    for category in Category::ALL {
        md.push_str(&format!(
            "| {} | {} |\n",
            category.label(),
            scores.category(category)
        ));
    }
    md.push_str(&format!("| **Overall** | **{}** |\n", scores.overall));
    md
}

/// Groups failed and warning results by (category, priority, check name)
fn collect_findings(
    results: &[CheckResultRecord],
) -> BTreeMap<(Category, Priority, &str), Finding> {
    let mut findings: BTreeMap<(Category, Priority, &str), Finding> = BTreeMap::new();

    for result in results {
        if result.status == CheckStatus::Passed {
            continue;
        }
        let finding = findings
            .entry((result.category, result.priority, result.check_name.as_str()))
            .or_default();
        finding.site_wide |= result.page_id.is_none();
        match result.status {
            CheckStatus::Failed => finding.failed += 1,
            CheckStatus::Warning => finding.warning += 1,
            CheckStatus::Passed => {}
        }
    }

    findings
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AuditStatus;
    use crate::storage::AuditRecord;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(scores: Option<AuditScores>) -> AuditSnapshot {
        let now = Utc::now();
        AuditSnapshot {
            audit: AuditRecord {
                id: 7,
                target_url: "https://example.com/".to_string(),
                status: AuditStatus::Completed,
                config_hash: "abc123".to_string(),
                created_at: now,
                started_at: Some(now),
                completed_at: Some(now),
                updated_at: now,
                batch_number: 2,
                batch_started_at: Some(now),
                pages_discovered: 12,
                pages_crawled: 10,
                scores,
                error_message: None,
            },
            recent_results: vec![],
            pending_urls: 2,
        }
    }

    fn result(
        name: &str,
        category: Category,
        priority: Priority,
        status: CheckStatus,
        page_id: Option<i64>,
    ) -> CheckResultRecord {
        CheckResultRecord {
            id: 0,
            audit_id: 7,
            page_id,
            check_name: name.to_string(),
            category,
            priority,
            status,
            detail: json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_metadata_and_scores() {
        let scores = AuditScores {
            seo: 80,
            ai_readiness: 60,
            technical: 100,
            overall: 80,
        };
        let md = render_report(&snapshot(Some(scores)), &[]);

        assert!(md.contains("# Site Audit: https://example.com/"));
        assert!(md.contains("- **Audit ID**: 7"));
        assert!(md.contains("- **Status**: completed"));
        assert!(md.contains("10 of 12 discovered (2 pending)"));
        assert!(md.contains("| SEO | 80 |"));
        assert!(md.contains("| AI Readiness | 60 |"));
        assert!(md.contains("| **Overall** | **80** |"));
        assert!(md.contains("No issues found."));
    }

    #[test]
    fn test_report_without_scores() {
        let md = render_report(&snapshot(None), &[]);
        assert!(md.contains("Scores are not available yet"));
    }

    #[test]
    fn test_findings_grouped_by_category_and_priority() {
        let results = vec![
            result("title-present", Category::Seo, Priority::Critical, CheckStatus::Failed, Some(1)),
            result("title-present", Category::Seo, Priority::Critical, CheckStatus::Failed, Some(2)),
            result("open-graph", Category::Seo, Priority::Optional, CheckStatus::Warning, Some(1)),
            result("https", Category::Technical, Priority::Critical, CheckStatus::Passed, None),
            result("hsts", Category::Technical, Priority::Optional, CheckStatus::Warning, None),
        ];
        let md = render_report(&snapshot(None), &results);

        assert!(md.contains("- **Failed**: 2"));
        assert!(md.contains("- **Warnings**: 2"));
        assert!(md.contains("### SEO"));
        assert!(md.contains("| title-present | page | 2 | 0 |"));
        assert!(md.contains("| hsts | site | 0 | 1 |"));
        assert!(!md.contains("| https |"));
        assert!(!md.contains("### AI Readiness"));

        let seo = md.find("### SEO").unwrap();
        let technical = md.find("### Technical").unwrap();
        let critical = md.find("#### Critical").unwrap();
        let optional = md.find("#### Optional").unwrap();
        assert!(seo < critical && critical < optional && optional < technical);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let report_dir = dir.path().join("reports");
        let path = write_report(&snapshot(None), &[], &report_dir).unwrap();

        assert_eq!(path, report_dir.join("audit-7.md"));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# Site Audit"));
    }
}
