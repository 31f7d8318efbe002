//! Audit engine - batch orchestration and lifecycle transitions
//!
//! This module ties the crawler, the check runner and the scorer together:
//! - Creating audits and seeding their queues
//! - Claiming batches through a conditional status update
//! - Running one time-boxed crawl phase followed by a check phase
//! - Deciding between `batch_complete` and `completed`
//! - Failing or resuming audits that stopped making progress
//! - Honoring stop requests with partial scores

use crate::checks::{collect_signals, CheckContext, CheckRegistry, CheckRunner, PageSummary, SiteSignals};
use crate::config::Config;
use crate::crawler::{build_http_client, parse_html, CrawlBudget, Scheduler};
use crate::engine::{AuditSnapshot, BatchReport, Reconciliation, RECENT_RESULTS_LIMIT};
use crate::robots::fetch_robots;
use crate::scoring::{score_records, AuditScores};
use crate::state::AuditStatus;
use crate::storage::{
    lock, open_storage, AuditRecord, AuditStore, PageRecord, SharedStorage, SqliteStorage,
    StorageResult,
};
use crate::url::normalize_url;
use crate::{AuditError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::time::{timeout_at, Instant as TokioInstant};
use url::Url;

struct EngineInner {
    config: Config,
    config_hash: String,
    storage: SharedStorage,
    registry: CheckRegistry,
    client: Client,
}

/// Drives audits through their lifecycle
///
/// Cloning is cheap; clones share storage, the check registry and the HTTP
/// client. Batches launched by [`AuditEngine::start`] and
/// [`AuditEngine::continue_audit`] run on the current tokio runtime.
#[derive(Clone)]
pub struct AuditEngine {
    inner: Arc<EngineInner>,
}

impl AuditEngine {
    /// Creates an engine over an opened store
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash recorded on every audit this engine creates
    /// * `storage` - The audit record store
    pub fn new(config: Config, config_hash: String, storage: SqliteStorage) -> Result<Self> {
        let timeout = Duration::from_secs(config.audit.request_timeout_secs);
        let client = build_http_client(&config.user_agent, timeout)?;

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                config_hash,
                storage: Arc::new(Mutex::new(storage)),
                registry: CheckRegistry::builtin(),
                client,
            }),
        })
    }

    /// Opens the configured database and creates an engine over it
    pub fn open(config: Config, config_hash: String) -> Result<Self> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Self::new(config, config_hash, storage)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.inner.registry
    }

    /// Shared handle to the underlying store
    pub fn storage(&self) -> SharedStorage {
        self.inner.storage.clone()
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T> {
        let mut guard = lock(&self.inner.storage)?;
        Ok(f(&mut guard)?)
    }

    // ===== Creation and claiming =====

    /// Creates a `pending` audit for `target_url` and enqueues its seed
    ///
    /// The URL must be absolute http(s); it is stored normalized.
    pub fn create_audit(&self, target_url: &str) -> Result<i64> {
        let seed = normalize_url(target_url)?;
        let audit_id = self.with_storage(|s| {
            let audit_id = s.create_audit(seed.as_str(), &self.inner.config_hash)?;
            s.enqueue_url(audit_id, seed.as_str())?;
            s.record_progress(audit_id)?;
            Ok(audit_id)
        })?;

        tracing::info!("Created audit {} for {}", audit_id, seed);
        Ok(audit_id)
    }

    /// Claims the next batch: `pending|batch_complete -> crawling`
    ///
    /// # Returns
    ///
    /// * `Ok(batch_number)` - This caller owns the new batch
    /// * `Err(AuditError::NotContinuable)` - The audit was not claimable,
    ///   including when a racing trigger claimed it first
    pub fn claim_batch(&self, audit_id: i64) -> Result<u32> {
        match self.with_storage(|s| s.claim_batch(audit_id))? {
            Some(batch_number) => {
                tracing::info!("Audit {} claimed batch {}", audit_id, batch_number);
                Ok(batch_number)
            }
            None => {
                let status = self.with_storage(|s| s.get_status(audit_id))?;
                Err(AuditError::NotContinuable { audit_id, status })
            }
        }
    }

    // ===== Triggers =====

    /// Creates an audit and launches its first batch in the background
    ///
    /// Returns the audit id as soon as the batch is claimed.
    pub fn start(&self, target_url: &str) -> Result<i64> {
        let handle = runtime()?;
        let audit_id = self.create_audit(target_url)?;
        self.claim_batch(audit_id)?;
        self.spawn_batch(&handle, audit_id);
        Ok(audit_id)
    }

    /// Launches the next batch of an audit waiting in `batch_complete`
    ///
    /// Any other status is rejected without touching the audit.
    pub fn continue_audit(&self, audit_id: i64) -> Result<u32> {
        let handle = runtime()?;
        let status = self.with_storage(|s| s.get_status(audit_id))?;
        if status != AuditStatus::BatchComplete {
            return Err(AuditError::NotContinuable { audit_id, status });
        }

        let batch_number = self.claim_batch(audit_id)?;
        self.spawn_batch(&handle, audit_id);
        Ok(batch_number)
    }

    /// Reconciles staleness, then returns the audit's current snapshot
    ///
    /// A `batch_complete` audit idle past the resume threshold has its next
    /// batch launched in the background. Without a runtime the resume is
    /// skipped and the read still succeeds.
    pub fn status(&self, audit_id: i64) -> Result<AuditSnapshot> {
        let handle = Handle::try_current().ok();
        if let Reconciliation::Resumed { .. } = self.reconcile(audit_id, handle.is_some())? {
            if let Some(handle) = &handle {
                self.spawn_batch(handle, audit_id);
            }
        }
        self.read_status(audit_id)
    }

    /// Requests cancellation
    ///
    /// The audit moves to `stopped` at once and its partial scores are
    /// saved. A batch still running notices at its next checkpoint.
    pub fn stop(&self, audit_id: i64) -> Result<AuditScores> {
        let status = self.with_storage(|s| s.get_status(audit_id))?;
        if !status.is_cancelable() {
            return Err(AuditError::NotCancelable { audit_id, status });
        }

        let cancelable = AuditStatus::cancelable_statuses();
        let stopped = self.with_storage(|s| {
            s.compare_and_set_status(audit_id, &cancelable, AuditStatus::Stopped, None)
        })?;
        if !stopped {
            let status = self.with_storage(|s| s.get_status(audit_id))?;
            return Err(AuditError::NotCancelable { audit_id, status });
        }

        tracing::info!("Audit {} stopped while {}", audit_id, status);
        self.finalize_scores(audit_id)
    }

    /// Runs batches inline until the audit stops needing them
    ///
    /// Claims the next batch whenever the audit is `pending` or
    /// `batch_complete`, so a single call carries an audit to a terminal
    /// status.
    pub async fn drive(&self, audit_id: i64) -> Result<AuditSnapshot> {
        loop {
            let status = self.with_storage(|s| s.get_status(audit_id))?;
            if !status.can_start_batch() {
                break;
            }
            self.claim_batch(audit_id)?;
            let report = self.run_batch(audit_id).await?;
            tracing::info!(
                "Audit {} batch {}: {} pages, {} checks, now {}",
                audit_id,
                report.batch_number,
                report.pages_crawled,
                report.checks_executed,
                report.status
            );
        }
        self.read_status(audit_id)
    }

    fn spawn_batch(&self, handle: &Handle, audit_id: i64) {
        let engine = self.clone();
        handle.spawn(async move {
            if let Err(e) = engine.run_batch(audit_id).await {
                tracing::error!("Batch for audit {} ended with error: {}", audit_id, e);
            }
        });
    }

    // ===== Reads =====

    /// Returns the stored state without reconciling anything
    pub fn read_status(&self, audit_id: i64) -> Result<AuditSnapshot> {
        self.with_storage(|s| {
            Ok(AuditSnapshot {
                audit: s.get_audit(audit_id)?,
                recent_results: s.recent_check_results(audit_id, RECENT_RESULTS_LIMIT)?,
                pending_urls: s.count_pending(audit_id)?,
            })
        })
    }

    /// Most recently created audits, newest first
    pub fn list_audits(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        self.with_storage(|s| s.list_audits(limit))
    }

    // ===== Staleness =====

    /// Fails or resumes an audit whose progress heartbeat went quiet
    ///
    /// | Status | Idle at least | Action |
    /// |--------|---------------|--------|
    /// | crawling, checking | `stale-after-secs` | `failed` with a timeout message |
    /// | batch_complete | `resume-after-secs` | next batch claimed |
    ///
    /// The caller owns launching a claimed batch.
    pub fn reconcile_staleness(&self, audit_id: i64) -> Result<Reconciliation> {
        self.reconcile(audit_id, true)
    }

    fn reconcile(&self, audit_id: i64, allow_resume: bool) -> Result<Reconciliation> {
        let audit = self.with_storage(|s| s.get_audit(audit_id))?;
        let idle = idle_secs(audit.updated_at, Utc::now());
        let thresholds = &self.inner.config.audit;

        match audit.status {
            status if status.is_running() && idle >= thresholds.stale_after_secs => {
                let message = format!(
                    "Audit timed out: no progress for {}s while {}",
                    idle, status
                );
                let failed = self.with_storage(|s| {
                    s.compare_and_set_status(audit_id, &[status], AuditStatus::Failed, Some(&message))
                })?;
                if failed {
                    tracing::warn!("Audit {}: {}", audit_id, message);
                    Ok(Reconciliation::Failed)
                } else {
                    Ok(Reconciliation::Unchanged)
                }
            }
            AuditStatus::BatchComplete if allow_resume && idle >= thresholds.resume_after_secs => {
                match self.with_storage(|s| s.claim_batch(audit_id))? {
                    Some(batch_number) => {
                        tracing::info!(
                            "Audit {} idle for {}s, resuming with batch {}",
                            audit_id,
                            idle,
                            batch_number
                        );
                        Ok(Reconciliation::Resumed { batch_number })
                    }
                    None => Ok(Reconciliation::Unchanged),
                }
            }
            _ => Ok(Reconciliation::Unchanged),
        }
    }

    // ===== Batch execution =====

    /// Executes the batch claimed for `audit_id`
    ///
    /// Any error other than a lost status race marks the audit failed with
    /// the error message before it is returned.
    pub async fn run_batch(&self, audit_id: i64) -> Result<BatchReport> {
        match self.execute_batch(audit_id).await {
            Ok(report) => Ok(report),
            Err(e @ AuditError::StatusConflict { .. }) => Err(e),
            Err(e) => {
                tracing::error!("Audit {} batch failed: {}", audit_id, e);
                let message = e.to_string();
                let running = [AuditStatus::Crawling, AuditStatus::Checking];
                if let Err(mark) = self.with_storage(|s| {
                    s.compare_and_set_status(audit_id, &running, AuditStatus::Failed, Some(&message))
                }) {
                    tracing::error!("Could not mark audit {} failed: {}", audit_id, mark);
                }
                Err(e)
            }
        }
    }

    async fn execute_batch(&self, audit_id: i64) -> Result<BatchReport> {
        let started = Instant::now();
        let settings = &self.inner.config.audit;
        let deadline = started + Duration::from_secs(settings.batch_time_budget_secs);

        let audit = self.with_storage(|s| s.get_audit(audit_id))?;
        if audit.status != AuditStatus::Crawling {
            return Err(AuditError::StatusConflict {
                audit_id,
                expected: AuditStatus::Crawling,
            });
        }

        let site = normalize_url(&audit.target_url)?;
        let crawled_so_far = self.with_storage(|s| s.count_pages(audit_id))?;
        let remaining = u64::from(settings.max_pages).saturating_sub(crawled_so_far);
        let max_pages = remaining.min(u64::from(settings.pages_per_batch)) as u32;

        tracing::info!(
            "Audit {} batch {}: crawling up to {} pages from {}",
            audit_id,
            audit.batch_number,
            max_pages,
            site
        );

        // ===== Crawl phase =====
        // robots.txt gates the first window, so like it only the request
        // timeout bounds it
        let robots = fetch_robots(&self.inner.client, &site).await?;
        let scheduler = Scheduler::new(
            self.inner.storage.clone(),
            audit_id,
            self.inner.client.clone(),
            site.clone(),
            robots,
            self.inner.config.user_agent.crawler_name.clone(),
            settings.fetch_concurrency as usize,
        );
        scheduler.queue().push(&site)?;
        let request_timeout = Duration::from_secs(settings.request_timeout_secs);
        let crawl = scheduler
            .run(CrawlBudget {
                max_pages,
                deadline,
                request_timeout,
            })
            .await?;

        let mut report = BatchReport {
            audit_id,
            batch_number: audit.batch_number,
            pages_crawled: crawl.pages_processed,
            checks_executed: 0,
            budget_exhausted: crawl.budget_exhausted,
            fetch_errors: crawl.errors,
            status: AuditStatus::Crawling,
            scores: None,
        };

        if crawl.interrupted {
            return self.finish_interrupted(report);
        }
        if !self.transition(audit_id, AuditStatus::Crawling, AuditStatus::Checking)? {
            return self.finish_interrupted(report);
        }

        // The crawl decides whether this is the last batch
        let (pending, pages) =
            self.with_storage(|s| Ok((s.count_pending(audit_id)?, s.count_pages(audit_id)?)))?;
        let done = pending == 0 || pages >= u64::from(settings.max_pages);

        // ===== Check phase =====
        let signals = if self.site_checks_pending(audit_id)? {
            self.site_signals(&site, deadline, request_timeout, done).await?
        } else {
            None
        };

        let now = Utc::now();
        match self.run_checks(audit_id, &site, signals.as_ref(), now)? {
            Some(executed) => report.checks_executed = executed,
            None => return self.finish_interrupted(report),
        }

        // ===== Completion =====

        if done {
            let scores = self.finalize_scores(audit_id)?;
            if !self.transition(audit_id, AuditStatus::Checking, AuditStatus::Completed)? {
                return self.finish_interrupted(report);
            }
            report.scores = Some(scores);
            report.status = AuditStatus::Completed;
            tracing::info!(
                "Audit {} completed: {} pages, overall score {}",
                audit_id,
                pages,
                scores.overall
            );
        } else {
            report.scores = self.interim_scores(audit_id)?;
            if !self.transition(audit_id, AuditStatus::Checking, AuditStatus::BatchComplete)? {
                return self.finish_interrupted(report);
            }
            report.status = AuditStatus::BatchComplete;
            tracing::info!(
                "Audit {} batch {} complete in {:.1}s; {} URLs pending",
                audit_id,
                report.batch_number,
                started.elapsed().as_secs_f64(),
                pending
            );
        }

        Ok(report)
    }

    /// Fetches the signals for site-wide checks, or `None` to defer them
    ///
    /// Before the last batch the fetches must fit the batch deadline, and
    /// site-wide checks wait for a later batch when they don't. The last
    /// batch always runs them, bounded by one request timeout past the
    /// deadline, with whatever signals arrived in time.
    async fn site_signals(
        &self,
        site: &Url,
        deadline: Instant,
        request_timeout: Duration,
        last_batch: bool,
    ) -> Result<Option<SiteSignals>> {
        let bound = if last_batch {
            deadline.max(Instant::now() + request_timeout)
        } else if Instant::now() < deadline {
            deadline
        } else {
            tracing::info!("No batch time left for site signals of {}, deferring", site);
            return Ok(None);
        };

        let fetch = collect_signals(&self.inner.client, site);
        match timeout_at(TokioInstant::from_std(bound), fetch).await {
            Ok(signals) => Ok(Some(signals?)),
            Err(_) if last_batch => {
                tracing::warn!("Site signals of {} timed out, checking without them", site);
                Ok(Some(SiteSignals::default()))
            }
            Err(_) => {
                tracing::info!("Site signals of {} ran past the batch deadline, deferring", site);
                Ok(None)
            }
        }
    }

    /// Runs outstanding site-wide and per-page checks
    ///
    /// Returns `None` if the audit left `checking` before or between pages.
    fn run_checks(
        &self,
        audit_id: i64,
        site: &Url,
        signals: Option<&SiteSignals>,
        now: DateTime<Utc>,
    ) -> Result<Option<usize>> {
        let runner = CheckRunner::new(&self.inner.registry, self.inner.storage.clone(), audit_id);
        let all_pages = self.with_storage(|s| s.list_pages(audit_id))?;
        let mut summaries: Vec<PageSummary> = all_pages.iter().map(PageRecord::summary).collect();
        summaries.sort_by(|a, b| a.url.cmp(&b.url));

        let mut executed = 0;

        if self.with_storage(|s| s.get_status(audit_id))? != AuditStatus::Checking {
            tracing::info!("Audit {} left checking, skipping checks", audit_id);
            return Ok(None);
        }

        if let Some(signals) = signals {
            // Site-wide checks read the seed page: the first one crawled
            let (url, seed) = match all_pages.first() {
                Some(page) => (Url::parse(&page.url)?, Some(page)),
                None => (site.clone(), None),
            };
            let facts = seed.map(|page| page.facts.clone()).unwrap_or_default();
            let document = seed
                .and_then(|page| page.html.as_deref())
                .map(|html| parse_html(html, &url));

            let ctx = CheckContext {
                url: &url,
                document: document.as_ref(),
                facts: &facts,
                pages: &summaries,
                site: signals,
                now,
            };
            executed += runner.run_site_checks(&ctx)?;
        }

        let empty = SiteSignals::default();
        let unchecked = self.with_storage(|s| s.unchecked_pages(audit_id))?;
        tracing::debug!("Audit {}: checking {} pages", audit_id, unchecked.len());

        for page in &unchecked {
            if self.with_storage(|s| s.get_status(audit_id))? != AuditStatus::Checking {
                tracing::info!("Audit {} left checking, stopping checks", audit_id);
                return Ok(None);
            }

            let url = Url::parse(&page.url)?;
            let document = page.html.as_deref().map(|html| parse_html(html, &url));
            let ctx = CheckContext {
                url: &url,
                document: document.as_ref(),
                facts: &page.facts,
                pages: &summaries,
                site: signals.unwrap_or(&empty),
                now,
            };
            executed += runner.run_page_checks(page.id, &ctx)?;

            self.with_storage(|s| {
                s.mark_page_checked(page.id)?;
                s.record_progress(audit_id)
            })?;
        }

        Ok(Some(executed))
    }

    fn site_checks_pending(&self, audit_id: i64) -> Result<bool> {
        let executed: HashSet<String> = self.with_storage(|s| s.executed_checks(audit_id, None))?;
        Ok(self
            .inner
            .registry
            .site_checks()
            .any(|check| !executed.contains(check.name)))
    }

    fn transition(&self, audit_id: i64, from: AuditStatus, to: AuditStatus) -> Result<bool> {
        let moved = self.with_storage(|s| s.compare_and_set_status(audit_id, &[from], to, None))?;
        if !moved {
            tracing::info!("Audit {} is no longer {}, not moving to {}", audit_id, from, to);
        }
        Ok(moved)
    }

    /// Wraps up a batch whose audit was stopped or failed underneath it
    fn finish_interrupted(&self, mut report: BatchReport) -> Result<BatchReport> {
        let status = self.with_storage(|s| s.get_status(report.audit_id))?;
        if status == AuditStatus::Stopped {
            report.scores = Some(self.finalize_scores(report.audit_id)?);
        }
        report.status = status;
        tracing::info!(
            "Audit {} batch {} interrupted; audit is {}",
            report.audit_id,
            report.batch_number,
            status
        );
        Ok(report)
    }

    // ===== Scores =====

    /// Scores every result recorded so far and saves the scores
    fn finalize_scores(&self, audit_id: i64) -> Result<AuditScores> {
        self.with_storage(|s| {
            s.record_progress(audit_id)?;
            let scores = score_records(&s.list_check_results(audit_id)?);
            s.save_scores(audit_id, &scores)?;
            Ok(scores)
        })
    }

    /// Like `finalize_scores`, but leaves scores unset while no result exists
    fn interim_scores(&self, audit_id: i64) -> Result<Option<AuditScores>> {
        self.with_storage(|s| {
            let results = s.list_check_results(audit_id)?;
            if results.is_empty() {
                return Ok(None);
            }
            let scores = score_records(&results);
            s.save_scores(audit_id, &scores)?;
            Ok(Some(scores))
        })
    }
}

fn runtime() -> Result<Handle> {
    Handle::try_current().map_err(|_| AuditError::NoRuntime)
}

/// Whole seconds from `since` to `now`, zero if `since` is in the future
fn idle_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(since).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditConfig, OutputConfig, UserAgentConfig};
    use chrono::Duration as ChronoDuration;

    fn config(audit: AuditConfig) -> Config {
        Config {
            audit,
            user_agent: UserAgentConfig {
                crawler_name: "SumiAudit".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "audits@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: ":memory:".to_string(),
                report_dir: "./reports".to_string(),
            },
        }
    }

    fn engine(audit: AuditConfig) -> AuditEngine {
        let storage = SqliteStorage::new_in_memory().unwrap();
        AuditEngine::new(config(audit), "hash".to_string(), storage).unwrap()
    }

    fn force_status(engine: &AuditEngine, audit_id: i64, from: AuditStatus, to: AuditStatus) {
        assert!(engine
            .with_storage(|s| s.compare_and_set_status(audit_id, &[from], to, None))
            .unwrap());
    }

    fn backdate(engine: &AuditEngine, audit_id: i64, secs: i64) {
        let then = Utc::now() - ChronoDuration::seconds(secs);
        engine
            .with_storage(|s| s.set_updated_at(audit_id, then))
            .unwrap();
    }

    #[test]
    fn test_create_audit_seeds_queue() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("HTTPS://Example.com").unwrap();

        let snapshot = engine.read_status(audit_id).unwrap();
        assert_eq!(snapshot.audit.status, AuditStatus::Pending);
        assert_eq!(snapshot.audit.target_url, "https://example.com/");
        assert_eq!(snapshot.audit.config_hash, "hash");
        assert_eq!(snapshot.pending_urls, 1);
        assert!(snapshot.recent_results.is_empty());
    }

    #[test]
    fn test_unknown_audit_is_not_found() {
        let engine = engine(AuditConfig::default());
        assert!(matches!(
            engine.read_status(999),
            Err(AuditError::AuditNotFound(999))
        ));
        assert!(matches!(engine.stop(999), Err(AuditError::AuditNotFound(999))));
    }

    #[test]
    fn test_list_audits_newest_first() {
        let engine = engine(AuditConfig::default());
        let first = engine.create_audit("https://example.com/").unwrap();
        let second = engine.create_audit("https://example.org/").unwrap();

        let ids: Vec<i64> = engine.list_audits(10).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(engine.list_audits(1).unwrap().len(), 1);
    }

    #[test]
    fn test_create_audit_rejects_non_http() {
        let engine = engine(AuditConfig::default());
        assert!(engine.create_audit("ftp://example.com/").is_err());
        assert!(engine.create_audit("not a url").is_err());
    }

    #[test]
    fn test_claim_batch_once() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("https://example.com/").unwrap();

        assert_eq!(engine.claim_batch(audit_id).unwrap(), 1);
        match engine.claim_batch(audit_id) {
            Err(AuditError::NotContinuable { status, .. }) => {
                assert_eq!(status, AuditStatus::Crawling)
            }
            other => panic!("expected NotContinuable, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_continue_rejects_wrong_status() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("https://example.com/").unwrap();

        let err = engine.continue_audit(audit_id).unwrap_err();
        assert!(matches!(
            err,
            AuditError::NotContinuable {
                status: AuditStatus::Pending,
                ..
            }
        ));
        let audit = engine.read_status(audit_id).unwrap().audit;
        assert_eq!(audit.status, AuditStatus::Pending);
        assert_eq!(audit.batch_number, 0);
    }

    #[test]
    fn test_continue_without_runtime() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("https://example.com/").unwrap();
        assert!(matches!(
            engine.continue_audit(audit_id),
            Err(AuditError::NoRuntime)
        ));
    }

    #[test]
    fn test_stop_pending_finalizes_scores() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("https://example.com/").unwrap();

        let scores = engine.stop(audit_id).unwrap();
        assert_eq!(scores, AuditScores::default());

        let audit = engine.read_status(audit_id).unwrap().audit;
        assert_eq!(audit.status, AuditStatus::Stopped);
        assert!(audit.completed_at.is_some());
        assert_eq!(audit.scores, Some(AuditScores::default()));
    }

    #[test]
    fn test_stop_terminal_is_rejected() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("https://example.com/").unwrap();
        engine.stop(audit_id).unwrap();

        assert!(matches!(
            engine.stop(audit_id),
            Err(AuditError::NotCancelable {
                status: AuditStatus::Stopped,
                ..
            })
        ));
    }

    #[test]
    fn test_stale_crawling_fails() {
        let engine = engine(AuditConfig {
            stale_after_secs: 60,
            ..AuditConfig::default()
        });
        let audit_id = engine.create_audit("https://example.com/").unwrap();
        engine.claim_batch(audit_id).unwrap();

        assert_eq!(
            engine.reconcile_staleness(audit_id).unwrap(),
            Reconciliation::Unchanged
        );

        backdate(&engine, audit_id, 120);
        assert_eq!(
            engine.reconcile_staleness(audit_id).unwrap(),
            Reconciliation::Failed
        );

        let audit = engine.read_status(audit_id).unwrap().audit;
        assert_eq!(audit.status, AuditStatus::Failed);
        let message = audit.error_message.unwrap();
        assert!(message.starts_with("Audit timed out"), "{}", message);
        assert!(message.contains("crawling"));
    }

    #[test]
    fn test_stale_batch_complete_resumes() {
        let engine = engine(AuditConfig {
            resume_after_secs: 60,
            ..AuditConfig::default()
        });
        let audit_id = engine.create_audit("https://example.com/").unwrap();
        engine.claim_batch(audit_id).unwrap();
        force_status(&engine, audit_id, AuditStatus::Crawling, AuditStatus::Checking);
        force_status(&engine, audit_id, AuditStatus::Checking, AuditStatus::BatchComplete);

        assert_eq!(
            engine.reconcile_staleness(audit_id).unwrap(),
            Reconciliation::Unchanged
        );

        backdate(&engine, audit_id, 120);
        assert_eq!(
            engine.reconcile_staleness(audit_id).unwrap(),
            Reconciliation::Resumed { batch_number: 2 }
        );
        assert_eq!(
            engine.read_status(audit_id).unwrap().audit.status,
            AuditStatus::Crawling
        );
    }

    #[test]
    fn test_status_without_runtime_skips_resume() {
        let engine = engine(AuditConfig {
            resume_after_secs: 0,
            ..AuditConfig::default()
        });
        let audit_id = engine.create_audit("https://example.com/").unwrap();
        engine.claim_batch(audit_id).unwrap();
        force_status(&engine, audit_id, AuditStatus::Crawling, AuditStatus::Checking);
        force_status(&engine, audit_id, AuditStatus::Checking, AuditStatus::BatchComplete);

        let snapshot = engine.status(audit_id).unwrap();
        assert_eq!(snapshot.audit.status, AuditStatus::BatchComplete);
        assert_eq!(snapshot.audit.batch_number, 1);
    }

    #[test]
    fn test_pending_is_never_stale() {
        let engine = engine(AuditConfig {
            stale_after_secs: 0,
            resume_after_secs: 0,
            ..AuditConfig::default()
        });
        let audit_id = engine.create_audit("https://example.com/").unwrap();
        backdate(&engine, audit_id, 3600);
        assert_eq!(
            engine.reconcile_staleness(audit_id).unwrap(),
            Reconciliation::Unchanged
        );
    }

    #[tokio::test]
    async fn test_run_batch_requires_claim() {
        let engine = engine(AuditConfig::default());
        let audit_id = engine.create_audit("https://example.com/").unwrap();

        assert!(matches!(
            engine.run_batch(audit_id).await,
            Err(AuditError::StatusConflict { .. })
        ));
        assert_eq!(
            engine.read_status(audit_id).unwrap().audit.status,
            AuditStatus::Pending
        );
    }

    #[test]
    fn test_idle_secs() {
        let now = Utc::now();
        assert_eq!(idle_secs(now - ChronoDuration::seconds(90), now), 90);
        assert_eq!(idle_secs(now + ChronoDuration::seconds(5), now), 0);
    }
}
