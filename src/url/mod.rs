//! URL handling module for Sumi-Audit
//!
//! This module provides URL normalization (the crawl queue's dedup key) and
//! the same-site test that keeps a crawl bounded to the audited site.

mod domain;
mod normalize;

pub use domain::{extract_domain, same_site, site_key};
pub use normalize::normalize_url;
