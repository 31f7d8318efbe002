//! Robots.txt handling module
//!
//! This module fetches and parses a site's robots.txt. The crawler consults
//! it before every fetch, and the site-wide checks read it to find the
//! sitemap and to see which AI crawlers the site lets in.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::fetch_text;
use crate::AuditError;
use reqwest::Client;
use url::Url;

/// Location of robots.txt for the site serving `site`
pub fn robots_url(site: &Url) -> Result<Url, AuditError> {
    Ok(site.join("/robots.txt")?)
}

/// Fetches robots.txt for a site
///
/// A missing or unreachable robots.txt allows everything.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `site` - Any URL on the site
///
/// # Returns
///
/// * `Ok(ParsedRobots)` - Parsed robots.txt, or allow-all when absent
/// * `Err(AuditError)` - The robots.txt URL could not be built
pub async fn fetch_robots(client: &Client, site: &Url) -> Result<ParsedRobots, AuditError> {
    let url = robots_url(site)?;
    match fetch_text(client, url.as_str()).await {
        Some(content) => {
            tracing::debug!("Fetched robots.txt from {}", url);
            Ok(ParsedRobots::from_content(&content))
        }
        None => {
            tracing::debug!("No robots.txt at {}, allowing all", url);
            Ok(ParsedRobots::allow_all())
        }
    }
}

/// Checks if a URL is allowed by robots.txt
///
/// # Arguments
///
/// * `robots` - The parsed robots.txt data
/// * `url` - The URL to check
/// * `user_agent` - The crawler's product token (e.g. `SumiAudit`)
pub fn is_allowed(robots: &ParsedRobots, url: &str, user_agent: &str) -> bool {
    robots.is_allowed(url, user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_robots_url() {
        let site = Url::parse("https://example.com/deep/page?q=1").unwrap();
        assert_eq!(
            robots_url(&site).unwrap().as_str(),
            "https://example.com/robots.txt"
        );
    }

    #[tokio::test]
    async fn test_fetch_robots_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
            )
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let robots = fetch_robots(&Client::new(), &site).await.unwrap();
        let private = format!("{}/private/page", server.uri());
        assert!(!is_allowed(&robots, &private, "TestBot"));
        assert!(is_allowed(&robots, &format!("{}/", server.uri()), "TestBot"));
    }

    #[tokio::test]
    async fn test_fetch_robots_missing_allows_all() {
        let server = MockServer::start().await;
        let site = Url::parse(&server.uri()).unwrap();
        let robots = fetch_robots(&Client::new(), &site).await.unwrap();
        assert!(robots.content().is_none());
        assert!(is_allowed(&robots, &format!("{}/any", server.uri()), "TestBot"));
    }
}
