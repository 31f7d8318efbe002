//! Core check types shared by the registry, runner, scorer and storage

use crate::crawler::PageDocument;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Scoring category a check contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Seo,
    AiReadiness,
    Technical,
}

impl Category {
    /// Every category, in report order
    pub const ALL: [Category; 3] = [Category::Seo, Category::AiReadiness, Category::Technical];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seo => "seo",
            Self::AiReadiness => "ai_readiness",
            Self::Technical => "technical",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seo" => Some(Self::Seo),
            "ai_readiness" => Some(Self::AiReadiness),
            "technical" => Some(Self::Technical),
            _ => None,
        }
    }

    /// Human-readable label for reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Seo => "SEO",
            Self::AiReadiness => "AI Readiness",
            Self::Technical => "Technical",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Priority tier of a check; determines its scoring weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Critical,
    Recommended,
    Optional,
}

impl Priority {
    /// Scoring weight: critical 3, recommended 2, optional 1
    pub fn weight(&self) -> u64 {
        match self {
            Self::Critical => 3,
            Self::Recommended => 2,
            Self::Optional => 1,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Recommended => "recommended",
            Self::Optional => "optional",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "recommended" => Some(Self::Recommended),
            "optional" => Some(Self::Optional),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Outcome status of one check execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

impl CheckStatus {
    /// Scoring credit in half-units: passed 2, warning 1, failed 0
    ///
    /// Half-units keep the scorer in integer arithmetic, so the result does
    /// not depend on summation order.
    pub fn half_credit(&self) -> u64 {
        match self {
            Self::Passed => 2,
            Self::Warning => 1,
            Self::Failed => 0,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Warning => "warning",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "passed" => Some(Self::Passed),
            "warning" => Some(Self::Warning),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Where a check is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Once per audit, against the seed page and site signals
    SiteWide,
    /// Once per crawled page
    Page,
}

/// Status plus structured detail returned by a check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub detail: Value,
}

impl CheckOutcome {
    pub fn passed(detail: Value) -> Self {
        Self {
            status: CheckStatus::Passed,
            detail,
        }
    }

    pub fn warning(detail: Value) -> Self {
        Self {
            status: CheckStatus::Warning,
            detail,
        }
    }

    pub fn failed(detail: Value) -> Self {
        Self {
            status: CheckStatus::Failed,
            detail,
        }
    }
}

/// A check that could not evaluate its input
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    #[error("{0}")]
    Evaluation(String),
}

/// Per-page facts recorded at fetch time
#[derive(Debug, Clone, Default)]
pub struct PageFacts {
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub is_resource: bool,
    pub response_time_ms: Option<u64>,
    pub last_modified: Option<String>,
    /// Lowercased response header names mapped to values
    pub headers: BTreeMap<String, String>,
    pub fetch_error: Option<String>,
}

impl PageFacts {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Compact view of a crawled page, used by cross-page checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
}

/// Auxiliary resources fetched once per audit for site-wide checks
#[derive(Debug, Clone, Default)]
pub struct SiteSignals {
    pub robots_txt: Option<String>,
    pub sitemap_url: Option<String>,
    pub sitemap: Option<String>,
    pub llms_txt: Option<String>,
}

/// Everything a check may look at; checks never perform I/O themselves
pub struct CheckContext<'a> {
    pub url: &'a Url,
    /// Parsed HTML, absent for resources and pages without a body
    pub document: Option<&'a PageDocument>,
    pub facts: &'a PageFacts,
    /// Every page crawled so far in this audit, sorted by URL
    pub pages: &'a [PageSummary],
    pub site: &'a SiteSignals,
    /// Evaluation clock for time-variant checks
    pub now: DateTime<Utc>,
}

impl<'a> CheckContext<'a> {
    /// Returns the parsed document or a `MissingInput` error
    pub fn document(&self) -> Result<&'a PageDocument, CheckError> {
        self.document.ok_or(CheckError::MissingInput("html document"))
    }
}

/// Signature of a check's evaluation function
pub type CheckFn = fn(&CheckContext<'_>) -> Result<CheckOutcome, CheckError>;

/// A statically registered check
#[derive(Clone, Copy)]
pub struct CheckDefinition {
    pub name: &'static str,
    pub category: Category,
    pub priority: Priority,
    pub scope: Scope,
    /// Skip this check for resources and pages without an HTML body
    pub requires_html: bool,
    /// Result may differ between runs over an unchanged site
    pub time_variant: bool,
    pub run: CheckFn,
}

impl fmt::Debug for CheckDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights() {
        assert_eq!(Priority::Critical.weight(), 3);
        assert_eq!(Priority::Recommended.weight(), 2);
        assert_eq!(Priority::Optional.weight(), 1);
    }

    #[test]
    fn test_half_credit() {
        assert_eq!(CheckStatus::Passed.half_credit(), 2);
        assert_eq!(CheckStatus::Warning.half_credit(), 1);
        assert_eq!(CheckStatus::Failed.half_credit(), 0);
    }

    #[test]
    fn test_db_strings_roundtrip() {
        for c in Category::ALL {
            assert_eq!(Category::from_db_string(c.to_db_string()), Some(c));
        }
        for p in [Priority::Critical, Priority::Recommended, Priority::Optional] {
            assert_eq!(Priority::from_db_string(p.to_db_string()), Some(p));
        }
        for s in [CheckStatus::Passed, CheckStatus::Warning, CheckStatus::Failed] {
            assert_eq!(CheckStatus::from_db_string(s.to_db_string()), Some(s));
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut facts = PageFacts::default();
        facts
            .headers
            .insert("strict-transport-security".to_string(), "max-age=1".to_string());
        assert_eq!(facts.header("Strict-Transport-Security"), Some("max-age=1"));
    }
}
