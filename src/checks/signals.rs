//! Site signal collection for site-wide checks

use crate::checks::types::SiteSignals;
use crate::crawler::fetch_text;
use crate::robots::{robots_url, ParsedRobots};
use crate::AuditError;
use reqwest::Client;
use url::Url;

/// Fetches robots.txt, the sitemap and llms.txt for the site serving `site`
///
/// The sitemap location is the first `Sitemap:` entry of robots.txt, falling
/// back to `/sitemap.xml`. Missing files are recorded as `None`.
pub async fn collect_signals(client: &Client, site: &Url) -> Result<SiteSignals, AuditError> {
    let robots_txt = fetch_text(client, robots_url(site)?.as_str()).await;

    let declared = robots_txt
        .as_deref()
        .map(ParsedRobots::from_content)
        .and_then(|robots| robots.sitemaps().into_iter().next());
    let sitemap_url = match declared {
        Some(url) => url,
        None => site.join("/sitemap.xml")?.to_string(),
    };
    let sitemap = fetch_text(client, &sitemap_url).await;

    let llms_txt = fetch_text(client, site.join("/llms.txt")?.as_str()).await;

    tracing::debug!(
        "Site signals for {}: robots.txt={}, sitemap={}, llms.txt={}",
        site,
        robots_txt.is_some(),
        sitemap.is_some(),
        llms_txt.is_some()
    );

    Ok(SiteSignals {
        robots_txt,
        sitemap_url: Some(sitemap_url),
        sitemap,
        llms_txt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sitemap_from_robots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "User-agent: *\nAllow: /\nSitemap: {}/maps/main.xml",
                server.uri()
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/maps/main.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset></urlset>"))
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let signals = collect_signals(&Client::new(), &site).await.unwrap();
        assert!(signals.robots_txt.is_some());
        assert_eq!(
            signals.sitemap_url,
            Some(format!("{}/maps/main.xml", server.uri()))
        );
        assert_eq!(signals.sitemap.as_deref(), Some("<urlset></urlset>"));
        assert!(signals.llms_txt.is_none());
    }

    #[tokio::test]
    async fn test_default_sitemap_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Site\n"))
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let signals = collect_signals(&Client::new(), &site).await.unwrap();
        assert!(signals.robots_txt.is_none());
        assert_eq!(
            signals.sitemap_url,
            Some(format!("{}/sitemap.xml", server.uri()))
        );
        assert!(signals.sitemap.is_none());
        assert_eq!(signals.llms_txt.as_deref(), Some("# Site\n"));
    }
}
