use url::Url;

/// Extracts the lowercase host from a URL
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the site key used for same-origin decisions
///
/// The key is the host without a leading `www.` plus the effective port,
/// so `http://www.example.com` and `https://example.com` belong to one site
/// while `blog.example.com` does not.
pub fn site_key(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Checks whether two URLs belong to the same audited site
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_audit::url::same_site;
///
/// let seed = Url::parse("https://www.example.com/").unwrap();
/// assert!(same_site(&seed, &Url::parse("https://example.com/about").unwrap()));
/// assert!(!same_site(&seed, &Url::parse("https://other.com/").unwrap()));
/// ```
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (site_key(a), site_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
