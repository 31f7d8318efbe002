use serde::Deserialize;

/// Main configuration structure for Sumi-Audit
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Budgets and thresholds that shape every audit
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Total page budget for one audit
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Page budget for a single batch
    #[serde(rename = "pages-per-batch", default = "default_pages_per_batch")]
    pub pages_per_batch: u32,

    /// Wall-clock budget for a single batch (seconds)
    #[serde(
        rename = "batch-time-budget-secs",
        default = "default_batch_time_budget_secs"
    )]
    pub batch_time_budget_secs: u64,

    /// Maximum number of fetches in flight at once
    #[serde(rename = "fetch-concurrency", default = "default_fetch_concurrency")]
    pub fetch_concurrency: u32,

    /// Timeout for a single HTTP request (seconds)
    #[serde(
        rename = "request-timeout-secs",
        default = "default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,

    /// Crawling/checking with no progress for this long marks the audit failed
    #[serde(rename = "stale-after-secs", default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// batch_complete with no progress for this long resumes automatically
    #[serde(rename = "resume-after-secs", default = "default_resume_after_secs")]
    pub resume_after_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            pages_per_batch: default_pages_per_batch(),
            batch_time_budget_secs: default_batch_time_budget_secs(),
            fetch_concurrency: default_fetch_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
            resume_after_secs: default_resume_after_secs(),
        }
    }
}

fn default_max_pages() -> u32 {
    100
}

fn default_pages_per_batch() -> u32 {
    25
}

fn default_batch_time_budget_secs() -> u64 {
    50
}

fn default_fetch_concurrency() -> u32 {
    4
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_resume_after_secs() -> u64 {
    120
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the full user agent string: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory markdown reports are written to
    #[serde(rename = "report-dir", default = "default_report_dir")]
    pub report_dir: String,
}

fn default_report_dir() -> String {
    "./reports".to_string()
}
