//! Check runner
//!
//! Evaluates registry entries against a context and persists one result
//! row per execution as soon as it is known. A check that returns an error
//! or panics is recorded as failed with the error in its detail.

use crate::checks::registry::CheckRegistry;
use crate::checks::types::{CheckContext, CheckDefinition, CheckOutcome};
use crate::storage::{lock, AuditStore, NewCheckResult, SharedStorage, StorageResult};
use serde_json::json;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

/// Evaluates one check, absorbing errors and panics
pub fn evaluate(check: &CheckDefinition, ctx: &CheckContext<'_>) -> CheckOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| (check.run)(ctx))) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            tracing::warn!("Check {} failed on {}: {}", check.name, ctx.url, e);
            CheckOutcome::failed(json!({ "error": e.to_string() }))
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "check panicked".to_string());
            tracing::warn!("Check {} panicked on {}: {}", check.name, ctx.url, message);
            CheckOutcome::failed(json!({ "error": message, "panicked": true }))
        }
    }
}

/// Runs registry checks for one audit and persists their results
pub struct CheckRunner<'a> {
    registry: &'a CheckRegistry,
    storage: SharedStorage,
    audit_id: i64,
}

impl<'a> CheckRunner<'a> {
    pub fn new(registry: &'a CheckRegistry, storage: SharedStorage, audit_id: i64) -> Self {
        Self {
            registry,
            storage,
            audit_id,
        }
    }

    /// Runs every site-wide check that has not executed yet
    ///
    /// # Returns
    ///
    /// The number of checks executed.
    pub fn run_site_checks(&self, ctx: &CheckContext<'_>) -> StorageResult<usize> {
        let executed = lock(&self.storage)?.executed_checks(self.audit_id, None)?;
        self.run(self.registry.site_checks(), ctx, None, &executed)
    }

    /// Runs every per-page check that has not executed yet for `page_id`
    ///
    /// Checks that need HTML are skipped when the context has no document.
    pub fn run_page_checks(&self, page_id: i64, ctx: &CheckContext<'_>) -> StorageResult<usize> {
        let executed = lock(&self.storage)?.executed_checks(self.audit_id, Some(page_id))?;
        self.run(self.registry.page_checks(), ctx, Some(page_id), &executed)
    }

    fn run<'c>(
        &self,
        checks: impl Iterator<Item = &'c CheckDefinition>,
        ctx: &CheckContext<'_>,
        page_id: Option<i64>,
        executed: &HashSet<String>,
    ) -> StorageResult<usize> {
        let mut count = 0;

        for check in checks {
            if executed.contains(check.name) {
                continue;
            }
            if check.requires_html && ctx.document.is_none() {
                continue;
            }

            let outcome = evaluate(check, ctx);
            tracing::debug!("Check {} on {}: {}", check.name, ctx.url, outcome.status);

            let result = NewCheckResult {
                page_id,
                check_name: check.name.to_string(),
                category: check.category,
                priority: check.priority,
                status: outcome.status,
                detail: outcome.detail,
            };
            lock(&self.storage)?.insert_check_result(self.audit_id, &result)?;
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::Fixture;
    use crate::checks::{Category, CheckError, CheckStatus, Priority, Scope};
    use crate::storage::{NewPage, SqliteStorage};
    use std::sync::{Arc, Mutex};

    fn passes(_: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
        Ok(CheckOutcome::passed(json!({})))
    }

    fn errors(_: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
        Err(CheckError::Evaluation("bad input".to_string()))
    }

    fn panics(_: &CheckContext<'_>) -> Result<CheckOutcome, CheckError> {
        panic!("broken check")
    }

    fn definition(
        name: &'static str,
        scope: Scope,
        requires_html: bool,
        run: crate::checks::CheckFn,
    ) -> CheckDefinition {
        CheckDefinition {
            name,
            category: Category::Technical,
            priority: Priority::Recommended,
            scope,
            requires_html,
            time_variant: false,
            run,
        }
    }

    fn setup(checks: Vec<CheckDefinition>) -> (CheckRegistry, SharedStorage, i64, i64) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let audit_id = storage.create_audit("https://example.com/", "h").unwrap();
        let page_id = storage
            .insert_page(
                audit_id,
                &NewPage {
                    url: "https://example.com/".to_string(),
                    ..NewPage::default()
                },
            )
            .unwrap()
            .unwrap();
        let registry = CheckRegistry::with_checks(checks).unwrap();
        (registry, Arc::new(Mutex::new(storage)), audit_id, page_id)
    }

    #[test]
    fn test_error_becomes_failed_result() {
        let fixture = Fixture::html("https://example.com/", "<html></html>");
        let outcome = evaluate(&definition("e", Scope::Page, false, errors), &fixture.context());
        assert_eq!(outcome.status, CheckStatus::Failed);
        assert_eq!(outcome.detail["error"], "bad input");
    }

    #[test]
    fn test_panic_becomes_failed_result() {
        let fixture = Fixture::html("https://example.com/", "<html></html>");
        let outcome = evaluate(&definition("p", Scope::Page, false, panics), &fixture.context());
        assert_eq!(outcome.status, CheckStatus::Failed);
        assert_eq!(outcome.detail["error"], "broken check");
    }

    #[test]
    fn test_broken_check_does_not_stop_the_rest() {
        let (registry, storage, audit_id, page_id) = setup(vec![
            definition("first", Scope::Page, false, passes),
            definition("broken", Scope::Page, false, panics),
            definition("last", Scope::Page, false, passes),
        ]);
        let fixture = Fixture::html("https://example.com/", "<html></html>");
        let runner = CheckRunner::new(&registry, storage.clone(), audit_id);

        assert_eq!(runner.run_page_checks(page_id, &fixture.context()).unwrap(), 3);
        assert_eq!(runner.run_page_checks(page_id, &fixture.context()).unwrap(), 0);
        let results = storage.lock().unwrap().list_check_results(audit_id).unwrap();
        let statuses: Vec<CheckStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![CheckStatus::Passed, CheckStatus::Failed, CheckStatus::Passed]
        );
    }

    #[test]
    fn test_skips_html_checks_without_document() {
        let (registry, storage, audit_id, page_id) = setup(vec![
            definition("needs-html", Scope::Page, true, passes),
            definition("any-page", Scope::Page, false, passes),
        ]);
        let fixture = Fixture::without_document("https://example.com/doc.pdf");
        let runner = CheckRunner::new(&registry, storage, audit_id);

        assert_eq!(runner.run_page_checks(page_id, &fixture.context()).unwrap(), 1);
    }

    #[test]
    fn test_site_checks_run_once() {
        let (registry, storage, audit_id, _) = setup(vec![
            definition("site", Scope::SiteWide, false, passes),
            definition("page", Scope::Page, false, passes),
        ]);
        let fixture = Fixture::html("https://example.com/", "<html></html>");
        let runner = CheckRunner::new(&registry, storage.clone(), audit_id);

        assert_eq!(runner.run_site_checks(&fixture.context()).unwrap(), 1);
        assert_eq!(runner.run_site_checks(&fixture.context()).unwrap(), 0);

        let results = storage.lock().unwrap().list_check_results(audit_id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page_id, None);
        assert_eq!(results[0].check_name, "site");
    }
}
