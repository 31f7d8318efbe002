//! HTML parser for extracting links and page facts
//!
//! This module turns an HTML body into a `PageDocument`: an owned summary of
//! everything the checks look at (title, meta tags, headings, images,
//! structured data, subresources) plus the links the scheduler follows.
//! The parsed DOM itself never leaves this module.

use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// An `<img>` reference found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Raw `src` attribute
    pub src: String,
    /// `alt` attribute; `None` when missing entirely
    pub alt: Option<String>,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct PageDocument {
    /// The page title (from the first <title> tag)
    pub title: Option<String>,
    /// `<meta name="description">`
    pub meta_description: Option<String>,
    /// `<html lang>`
    pub lang: Option<String>,
    /// `<link rel="canonical">`, resolved to an absolute URL
    pub canonical: Option<String>,
    /// `<meta name="robots">`
    pub meta_robots: Option<String>,
    /// `<meta name="viewport">`
    pub viewport: Option<String>,
    /// Headings in document order as (level, text)
    pub headings: Vec<(u8, String)>,
    pub images: Vec<ImageRef>,
    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
    /// `og:*` properties
    pub open_graph: BTreeMap<String, String>,
    /// Raw bodies of `application/ld+json` scripts
    pub json_ld: Vec<String>,
    /// Absolute URLs of embedded resources (images, scripts, styles, frames)
    pub subresources: Vec<String>,
    /// Words of visible body text
    pub word_count: usize,
}

impl PageDocument {
    /// Number of `<h1>` elements
    pub fn h1_count(&self) -> usize {
        self.headings.iter().filter(|(level, _)| *level == 1).count()
    }
}

/// Parses HTML content and extracts links and page facts
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// **Note:** `rel="nofollow"` links ARE followed
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Example
///
/// ```no_run
/// use sumi_audit::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> PageDocument {
    let document = Html::parse_document(html);

    let canonical = first_attr(&document, "link[rel='canonical'][href]", "href")
        .and_then(|href| resolve_link(&href, base_url));

    PageDocument {
        title: first_text(&document, "title"),
        meta_description: first_attr(&document, "meta[name='description']", "content"),
        lang: first_attr(&document, "html[lang]", "lang"),
        canonical,
        meta_robots: first_attr(&document, "meta[name='robots']", "content"),
        viewport: first_attr(&document, "meta[name='viewport']", "content"),
        headings: extract_headings(&document),
        images: extract_images(&document),
        links: extract_links(&document, base_url),
        open_graph: extract_open_graph(&document),
        json_ld: extract_json_ld(&document),
        subresources: extract_subresources(&document, base_url),
        word_count: count_words(&document),
    }
}

fn select_all<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the trimmed text of the first match, if non-empty
fn first_text(document: &Html, selector: &str) -> Option<String> {
    select_all(document, selector)
        .first()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

/// Extracts the trimmed attribute of the first match, if non-empty
fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    select_all(document, selector)
        .iter()
        .find_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_headings(document: &Html) -> Vec<(u8, String)> {
    select_all(document, "h1, h2, h3, h4, h5, h6")
        .iter()
        .filter_map(|element| {
            let level = element.value().name().strip_prefix('h')?.parse::<u8>().ok()?;
            Some((level, element_text(element)))
        })
        .collect()
}

fn extract_images(document: &Html) -> Vec<ImageRef> {
    select_all(document, "img")
        .iter()
        .map(|element| ImageRef {
            src: element.value().attr("src").unwrap_or("").to_string(),
            alt: element.value().attr("alt").map(|alt| alt.trim().to_string()),
        })
        .collect()
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for element in select_all(document, "a[href]") {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    for element in select_all(document, "link[rel='canonical'][href]") {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    links
}

fn extract_open_graph(document: &Html) -> BTreeMap<String, String> {
    select_all(document, "meta[property^='og:']")
        .iter()
        .filter_map(|element| {
            let property = element.value().attr("property")?;
            let content = element.value().attr("content")?.trim();
            (!content.is_empty()).then(|| (property.to_string(), content.to_string()))
        })
        .collect()
}

fn extract_json_ld(document: &Html) -> Vec<String> {
    select_all(document, "script[type='application/ld+json']")
        .iter()
        .map(|element| element.inner_html().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collects embedded resources; used by the mixed-content check
fn extract_subresources(document: &Html, base_url: &Url) -> Vec<String> {
    const SOURCES: &[(&str, &str)] = &[
        ("img[src]", "src"),
        ("script[src]", "src"),
        ("iframe[src]", "src"),
        ("source[src]", "src"),
        ("video[src]", "src"),
        ("audio[src]", "src"),
        ("link[rel='stylesheet'][href]", "href"),
    ];

    SOURCES
        .iter()
        .flat_map(|(selector, attr)| {
            select_all(document, selector)
                .into_iter()
                .filter_map(|element| element.value().attr(attr).map(str::to_string))
                .collect::<Vec<_>>()
        })
        .filter_map(|src| resolve_link(&src, base_url))
        .collect()
}

/// Counts whitespace-separated words in `<body>`, ignoring script and style text
fn count_words(document: &Html) -> usize {
    let bodies = select_all(document, "body");
    let Some(body) = bodies.first() else {
        return 0;
    };

    body.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?;
            let parent_name = parent.value().as_element().map(|e| e.name()).unwrap_or("");
            if matches!(parent_name, "script" | "style" | "noscript" | "template") {
                return None;
            }
            Some(text.split_whitespace().count())
        })
        .sum()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Same page anchors
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
