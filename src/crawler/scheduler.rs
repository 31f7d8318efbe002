//! Breadth-first crawl scheduler
//!
//! This module drives one batch of crawling:
//! - Pulling the oldest pending URLs from the durable queue
//! - Honoring robots.txt before every fetch
//! - Fetching a small window of URLs concurrently
//! - Recording every fetched page, including degraded ones
//! - Enqueuing same-site links for later windows
//! - Stopping at the page budget, the wall-clock deadline, or when the
//!   audit leaves `crawling`
//!
//! Every fetch is cut off at the batch deadline, except those of the first
//! window, which are bounded by the request timeout alone. A batch therefore
//! always records at least one window of pages, and a fetch cut off in a
//! later window stays queued for the next batch.

use crate::checks::PageFacts;
use crate::crawler::fetcher::{fetch_url, FetchResult, ResponseMeta};
use crate::crawler::parser::parse_html;
use crate::crawler::queue::CrawlQueue;
use crate::robots::{is_allowed, ParsedRobots};
use crate::state::AuditStatus;
use crate::storage::{lock, AuditStore, NewPage, SharedStorage, StorageResult};
use crate::url::{normalize_url, same_site};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;
use url::Url;

/// Limits for one batch of crawling
#[derive(Debug, Clone, Copy)]
pub struct CrawlBudget {
    /// Pages this batch may fetch
    pub max_pages: u32,
    /// Wall-clock deadline for starting windows and finishing fetches
    pub deadline: Instant,
    /// Bound on the first window's fetches, which run even past the deadline
    pub request_timeout: Duration,
}

impl CrawlBudget {
    /// Deadline for fetches of a window starting now
    fn fetch_deadline(&self, first_window: bool) -> Instant {
        if first_window {
            self.deadline.max(Instant::now() + self.request_timeout)
        } else {
            self.deadline
        }
    }
}

/// A URL that could not be fetched normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub error: String,
}

/// What one batch of crawling achieved
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Pages fetched and recorded (degraded pages included)
    pub pages_processed: u32,
    /// The budget ran out while URLs were still pending
    pub budget_exhausted: bool,
    /// The audit left `crawling` (stopped or failed) mid-batch
    pub interrupted: bool,
    /// Fetches cut off by the deadline; their URLs stay pending
    pub deferred: u32,
    pub errors: Vec<FetchFailure>,
}

/// Breadth-first scheduler for a single audit
pub struct Scheduler {
    storage: SharedStorage,
    queue: CrawlQueue,
    client: Client,
    /// Normalized seed URL; links are followed only within its site
    site: Url,
    robots: ParsedRobots,
    /// Product token matched against robots.txt groups
    robots_agent: String,
    concurrency: usize,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `storage` - Shared audit storage
    /// * `audit_id` - The audit being crawled
    /// * `client` - HTTP client carrying the crawler's user agent
    /// * `site` - Normalized seed URL
    /// * `robots` - The site's robots.txt
    /// * `robots_agent` - Product token for robots.txt matching
    /// * `concurrency` - Fetches in flight at once
    pub fn new(
        storage: SharedStorage,
        audit_id: i64,
        client: Client,
        site: Url,
        robots: ParsedRobots,
        robots_agent: String,
        concurrency: usize,
    ) -> Self {
        Self {
            queue: CrawlQueue::new(storage.clone(), audit_id),
            storage,
            client,
            site,
            robots,
            robots_agent,
            concurrency: concurrency.max(1),
        }
    }

    pub fn queue(&self) -> &CrawlQueue {
        &self.queue
    }

    /// Crawls until the queue drains, the budget runs out, or the audit
    /// leaves `crawling`
    ///
    /// Fetch failures are recorded as degraded pages and never abort the
    /// batch; only storage errors are returned.
    pub async fn run(&self, budget: CrawlBudget) -> StorageResult<CrawlOutcome> {
        let mut outcome = CrawlOutcome::default();
        let audit_id = self.queue.audit_id();
        let mut first_window = true;

        loop {
            if self.current_status()? != AuditStatus::Crawling {
                tracing::info!("Audit {} left crawling, stopping crawl", audit_id);
                outcome.interrupted = true;
                break;
            }

            let out_of_time = !first_window && Instant::now() >= budget.deadline;
            if outcome.pages_processed >= budget.max_pages || out_of_time {
                outcome.budget_exhausted = self.queue.pending()? > 0;
                break;
            }

            let window = (budget.max_pages - outcome.pages_processed).min(self.concurrency as u32);
            let entries = self.queue.next_batch(window)?;
            if entries.is_empty() {
                tracing::debug!("Crawl queue for audit {} is empty", audit_id);
                break;
            }

            let mut to_fetch = Vec::with_capacity(entries.len());
            for entry in entries {
                if is_allowed(&self.robots, &entry.url, &self.robots_agent) {
                    to_fetch.push(entry.url);
                } else {
                    tracing::info!("URL {} disallowed by robots.txt", entry.url);
                    self.queue.complete(&entry.url)?;
                    outcome.errors.push(FetchFailure {
                        url: entry.url,
                        error: "Disallowed by robots.txt".to_string(),
                    });
                }
            }

            let fetch_deadline = tokio::time::Instant::from_std(budget.fetch_deadline(first_window));
            first_window = false;

            let results: Vec<(String, Option<FetchResult>)> = stream::iter(to_fetch)
                .map(|url| {
                    let client = self.client.clone();
                    async move {
                        let result = timeout_at(fetch_deadline, fetch_url(&client, &url))
                            .await
                            .ok();
                        (url, result)
                    }
                })
                .buffered(self.concurrency)
                .collect()
                .await;

            for (url, result) in results {
                let Some(result) = result else {
                    tracing::info!("Fetch of {} ran past the batch deadline, leaving it queued", url);
                    outcome.deferred += 1;
                    continue;
                };
                if self.record(&url, result, &mut outcome.errors)? {
                    outcome.pages_processed += 1;
                }
            }

            lock(&self.storage)?.record_progress(audit_id)?;
        }

        tracing::info!(
            "Audit {}: crawled {} pages this batch ({} fetch errors, {} deferred)",
            audit_id,
            outcome.pages_processed,
            outcome.errors.len(),
            outcome.deferred
        );

        Ok(outcome)
    }

    fn current_status(&self) -> StorageResult<AuditStatus> {
        lock(&self.storage)?.get_status(self.queue.audit_id())
    }

    /// Records one fetch result; returns false if it collapsed into a page
    /// that was already crawled
    fn record(
        &self,
        url: &str,
        result: FetchResult,
        errors: &mut Vec<FetchFailure>,
    ) -> StorageResult<bool> {
        let page_url = self.page_url(url, &result);

        if page_url != url {
            tracing::debug!("{} redirected to {}", url, page_url);
            self.queue.complete(url)?;
            if let Ok(target) = Url::parse(&page_url) {
                self.queue.push(&target)?;
            }
            if !self.queue.complete(&page_url)? {
                tracing::debug!("Redirect target {} already crawled", page_url);
                return Ok(false);
            }
        } else if !self.queue.complete(url)? {
            return Ok(false);
        }

        let page = match result {
            FetchResult::Success { meta, body } => {
                let base = Url::parse(&meta.final_url).unwrap_or_else(|_| self.site.clone());
                let document = parse_html(&body, &base);
                self.enqueue_links(&document.links)?;
                tracing::debug!("Fetched {} ({} links)", page_url, document.links.len());

                NewPage {
                    url: page_url,
                    title: document.title,
                    meta_description: document.meta_description,
                    facts: facts_from(meta, false, None),
                    html: Some(body),
                }
            }

            FetchResult::Resource { meta } => {
                tracing::debug!("Fetched resource {}", page_url);
                NewPage {
                    url: page_url,
                    facts: facts_from(meta, true, None),
                    ..NewPage::default()
                }
            }

            FetchResult::HttpError { meta } => {
                let error = format!("HTTP {}", meta.status_code);
                tracing::warn!("Fetch of {} returned {}", page_url, error);
                errors.push(FetchFailure {
                    url: page_url.clone(),
                    error: error.clone(),
                });
                NewPage {
                    url: page_url,
                    facts: facts_from(meta, false, Some(error)),
                    ..NewPage::default()
                }
            }

            FetchResult::NetworkError { error } => {
                tracing::warn!("Fetch of {} failed: {}", page_url, error);
                errors.push(FetchFailure {
                    url: page_url.clone(),
                    error: error.clone(),
                });
                NewPage {
                    url: page_url,
                    facts: PageFacts {
                        fetch_error: Some(error),
                        ..PageFacts::default()
                    },
                    ..NewPage::default()
                }
            }
        };

        let inserted = lock(&self.storage)?.insert_page(self.queue.audit_id(), &page)?;
        Ok(inserted.is_some())
    }

    /// The URL a page is recorded under: the normalized final URL when a
    /// same-site redirect happened, the queued URL otherwise
    fn page_url(&self, url: &str, result: &FetchResult) -> String {
        result
            .final_url()
            .and_then(|final_url| normalize_url(final_url).ok())
            .filter(|final_url| same_site(&self.site, final_url))
            .map(|final_url| final_url.to_string())
            .unwrap_or_else(|| url.to_string())
    }

    fn enqueue_links(&self, links: &[String]) -> StorageResult<()> {
        for link in links {
            let Ok(normalized) = normalize_url(link) else {
                continue;
            };
            if same_site(&self.site, &normalized) {
                self.queue.push(&normalized)?;
            }
        }
        Ok(())
    }
}

fn facts_from(meta: ResponseMeta, is_resource: bool, fetch_error: Option<String>) -> PageFacts {
    PageFacts {
        status_code: Some(meta.status_code),
        content_type: meta.content_type,
        is_resource,
        response_time_ms: Some(meta.response_time_ms),
        last_modified: meta.last_modified,
        headers: meta.headers,
        fetch_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            format!("<html><head><title>T</title></head><body>{}</body></html>", body),
            "text/html",
        )
    }

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn setup(server: &MockServer, robots: ParsedRobots) -> (SharedStorage, Scheduler) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let seed = normalize_url(&format!("{}/", server.uri())).unwrap();
        let audit_id = storage.create_audit(seed.as_str(), "h").unwrap();
        storage.claim_batch(audit_id).unwrap();
        storage.enqueue_url(audit_id, seed.as_str()).unwrap();

        let storage = Arc::new(Mutex::new(storage));
        let scheduler = Scheduler::new(
            storage.clone(),
            audit_id,
            Client::new(),
            seed,
            robots,
            "TestBot".to_string(),
            2,
        );
        (storage, scheduler)
    }

    fn budget(max_pages: u32) -> CrawlBudget {
        CrawlBudget {
            max_pages,
            deadline: Instant::now() + Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_crawls_site_breadth_first() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/",
            html(r#"<a href="/a">A</a><a href="/b">B</a><a href="https://other.example/">X</a>"#),
        )
        .await;
        mount(&server, "/a", html(r#"<a href="/">home</a><a href="/c">C</a>"#)).await;
        mount(&server, "/b", html("")).await;
        mount(&server, "/c", html("")).await;

        let (storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        let outcome = scheduler.run(budget(10)).await.unwrap();

        assert_eq!(outcome.pages_processed, 4);
        assert!(!outcome.budget_exhausted);
        assert!(outcome.errors.is_empty());

        let storage = storage.lock().unwrap();
        let pages = storage.list_pages(scheduler.queue().audit_id()).unwrap();
        let paths: Vec<String> = pages
            .iter()
            .map(|p| Url::parse(&p.url).unwrap().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/", "/a", "/b", "/c"]);
    }

    #[tokio::test]
    async fn test_budget_exhausted_leaves_pending() {
        let server = MockServer::start().await;
        mount(&server, "/", html(r#"<a href="/a">A</a><a href="/b">B</a>"#)).await;
        mount(&server, "/a", html("")).await;
        mount(&server, "/b", html("")).await;

        let (_storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        let outcome = scheduler.run(budget(2)).await.unwrap();

        assert_eq!(outcome.pages_processed, 2);
        assert!(outcome.budget_exhausted);
        assert_eq!(scheduler.queue().pending().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_first_window_runs_past_deadline() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/",
            html(r#"<a href="/a">A</a>"#).set_delay(Duration::from_millis(200)),
        )
        .await;
        mount(&server, "/a", html("")).await;

        let (_storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        let outcome = scheduler
            .run(CrawlBudget {
                max_pages: 10,
                deadline: Instant::now(),
                request_timeout: Duration::from_secs(10),
            })
            .await
            .unwrap();

        assert_eq!(outcome.pages_processed, 1);
        assert_eq!(outcome.deferred, 0);
        assert!(outcome.budget_exhausted);
        assert_eq!(scheduler.queue().pending().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_past_deadline_stays_queued() {
        let server = MockServer::start().await;
        mount(&server, "/", html(r#"<a href="/slow">S</a>"#)).await;
        mount(&server, "/slow", html("").set_delay(Duration::from_secs(3))).await;

        let (storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        let started = Instant::now();
        let outcome = scheduler
            .run(CrawlBudget {
                max_pages: 10,
                deadline: started + Duration::from_millis(500),
                request_timeout: Duration::from_secs(10),
            })
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.pages_processed, 1);
        assert_eq!(outcome.deferred, 1);
        assert!(outcome.budget_exhausted);
        assert!(outcome.errors.is_empty());

        let audit_id = scheduler.queue().audit_id();
        assert_eq!(scheduler.queue().pending().unwrap(), 1);
        assert!(storage
            .lock()
            .unwrap()
            .get_page_by_url(audit_id, &format!("{}/slow", server.uri()))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_degraded_pages_do_not_abort() {
        let server = MockServer::start().await;
        mount(&server, "/", html(r#"<a href="/missing">M</a><a href="/ok">OK</a>"#)).await;
        mount(&server, "/ok", html("")).await;

        let (storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        let outcome = scheduler.run(budget(10)).await.unwrap();

        assert_eq!(outcome.pages_processed, 3);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].error, "HTTP 404");

        let storage = storage.lock().unwrap();
        let missing = storage
            .get_page_by_url(
                scheduler.queue().audit_id(),
                &format!("{}/missing", server.uri()),
            )
            .unwrap()
            .unwrap();
        assert_eq!(missing.facts.status_code, Some(404));
        assert!(missing.html.is_none());
    }

    #[tokio::test]
    async fn test_robots_disallowed_not_fetched() {
        let server = MockServer::start().await;
        mount(&server, "/", html(r#"<a href="/private/x">P</a>"#)).await;
        Mock::given(method("GET"))
            .and(path("/private/x"))
            .respond_with(html(""))
            .expect(0)
            .mount(&server)
            .await;

        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private");
        let (_storage, scheduler) = setup(&server, robots);
        let outcome = scheduler.run(budget(10)).await.unwrap();

        assert_eq!(outcome.pages_processed, 1);
        assert_eq!(outcome.errors[0].error, "Disallowed by robots.txt");
        assert_eq!(scheduler.queue().pending().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redirect_collapses_to_final_url() {
        let server = MockServer::start().await;
        mount(&server, "/", html(r#"<a href="/old">Old</a><a href="/new">New</a>"#)).await;
        mount(
            &server,
            "/old",
            ResponseTemplate::new(301).insert_header("Location", "/new"),
        )
        .await;
        mount(&server, "/new", html("")).await;

        let (storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        scheduler.run(budget(10)).await.unwrap();

        let storage = storage.lock().unwrap();
        let audit_id = scheduler.queue().audit_id();
        assert!(storage
            .get_page_by_url(audit_id, &format!("{}/old", server.uri()))
            .unwrap()
            .is_none());
        assert!(storage
            .get_page_by_url(audit_id, &format!("{}/new", server.uri()))
            .unwrap()
            .is_some());
        assert_eq!(storage.count_pages(audit_id).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stops_when_audit_leaves_crawling() {
        let server = MockServer::start().await;
        mount(&server, "/", html("")).await;

        let (storage, scheduler) = setup(&server, ParsedRobots::allow_all());
        storage
            .lock()
            .unwrap()
            .compare_and_set_status(
                scheduler.queue().audit_id(),
                &[AuditStatus::Crawling],
                AuditStatus::Stopped,
                None,
            )
            .unwrap();

        let outcome = scheduler.run(budget(10)).await.unwrap();
        assert!(outcome.interrupted);
        assert_eq!(outcome.pages_processed, 0);
    }
}
