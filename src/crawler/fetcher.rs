//! HTTP fetcher implementation
//!
//! This module performs the single bounded GET behind every crawled page:
//! - Building HTTP clients with proper user agent strings
//! - Following redirects to the final URL
//! - Timing the response and recording a small set of headers
//! - Splitting HTML pages from non-HTML resources
//! - Error classification

use crate::config::UserAgentConfig;
use reqwest::{header::HeaderMap, redirect::Policy, Client};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Maximum number of redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Response headers kept with each page; everything else is dropped
const RECORDED_HEADERS: &[&str] = &[
    "cache-control",
    "content-security-policy",
    "content-type",
    "last-modified",
    "strict-transport-security",
    "x-content-type-options",
    "x-robots-tag",
];

/// Metadata of a response that reached the server
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Last-Modified header value
    pub last_modified: Option<String>,
    /// Recorded headers, lowercased names
    pub headers: BTreeMap<String, String>,
    /// Time until the body was fully read
    pub response_time_ms: u64,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        meta: ResponseMeta,
        /// Page body content
        body: String,
    },

    /// Successfully fetched a non-HTML resource; the body is discarded
    Resource { meta: ResponseMeta },

    /// The server answered with a non-2xx status
    HttpError { meta: ResponseMeta },

    /// Network error (connection refused, timeout, too many redirects, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Response metadata, if the server answered at all
    pub fn meta(&self) -> Option<&ResponseMeta> {
        match self {
            Self::Success { meta, .. } | Self::Resource { meta } | Self::HttpError { meta } => {
                Some(meta)
            }
            Self::NetworkError { .. } => None,
        }
    }

    /// Final URL after redirects, if the server answered
    pub fn final_url(&self) -> Option<&str> {
        self.meta().map(|meta| meta.final_url.as_str())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total timeout for one request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_audit::config::UserAgentConfig;
/// use sumi_audit::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiAudit".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(15)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, following redirects
///
/// # Outcome Mapping
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx, HTML content type | `Success` with body |
/// | 2xx, any other content type | `Resource` |
/// | non-2xx | `HttpError` |
/// | Timeout, connection, TLS, redirect limit | `NetworkError` |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let started = Instant::now();

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchResult::NetworkError {
                error: classify_error(&e),
            }
        }
    };

    let status = response.status();
    let final_url = response.url().to_string();
    let headers = recorded_headers(response.headers());
    let content_type = headers.get("content-type").cloned();
    let last_modified = headers.get("last-modified").cloned();

    let mut meta = ResponseMeta {
        final_url,
        status_code: status.as_u16(),
        content_type,
        last_modified,
        headers,
        response_time_ms: 0,
    };

    if !status.is_success() {
        meta.response_time_ms = elapsed_ms(started);
        return FetchResult::HttpError { meta };
    }

    if !meta.content_type.as_deref().map(is_html).unwrap_or(false) {
        meta.response_time_ms = elapsed_ms(started);
        return FetchResult::Resource { meta };
    }

    match response.text().await {
        Ok(body) => {
            meta.response_time_ms = elapsed_ms(started);
            FetchResult::Success { meta, body }
        }
        Err(e) => FetchResult::NetworkError {
            error: classify_error(&e),
        },
    }
}

/// Fetches a small auxiliary text file (robots.txt, sitemap, llms.txt)
///
/// Returns `None` for anything but a 2xx answer.
pub async fn fetch_text(client: &Client, url: &str) -> Option<String> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Auxiliary fetch of {} failed: {}", url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!("Auxiliary fetch of {} returned {}", url, response.status());
        return None;
    }

    response.text().await.ok()
}

/// Returns true for HTML content types
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

fn recorded_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    RECORDED_HEADERS
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        format!("Too many redirects (limit {})", MAX_REDIRECTS)
    } else {
        e.to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
