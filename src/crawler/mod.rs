//! Crawler module for web page fetching and processing
//!
//! This module contains the crawling half of an audit batch:
//! - HTTP fetching with redirect following and response timing
//! - HTML parsing into a `PageDocument`
//! - The durable per-audit crawl queue
//! - Breadth-first scheduling within a batch budget

mod fetcher;
mod parser;
mod queue;
mod scheduler;

pub use fetcher::{build_http_client, fetch_text, fetch_url, is_html, FetchResult, ResponseMeta};
pub use parser::{parse_html, resolve_link, ImageRef, PageDocument};
pub use queue::CrawlQueue;
pub use scheduler::{CrawlBudget, CrawlOutcome, FetchFailure, Scheduler};
