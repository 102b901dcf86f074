use crate::crawler::CrawlMode;
use crate::summarize::RetryPolicy;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

/// Registry key used when a source does not name an extractor
pub const DEFAULT_EXTRACTOR: &str = "meta-tags";

/// Main configuration structure for News-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

impl Config {
    /// Looks up a configured source by id
    pub fn source(&self, id: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.id == id)
    }
}

/// Harvest run behavior
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// First day of the crawl window (inclusive)
    #[serde(rename = "start-date")]
    pub start_date: NaiveDate,

    /// Last day of the crawl window (inclusive); today when omitted
    #[serde(rename = "end-date", default)]
    pub end_date: Option<NaiveDate>,

    /// `full` walks the whole window, `update` resumes from the newest stored article
    #[serde(default)]
    pub mode: CrawlMode,

    /// Maximum records per source; 0 means unbounded
    #[serde(rename = "item-count-cap", default)]
    pub item_count_cap: u32,

    /// Skip page fetches for urls already in the archive
    #[serde(rename = "skip-known-urls", default = "default_true")]
    pub skip_known_urls: bool,
}

impl HarvestConfig {
    /// Resolves the window end, falling back to `today`
    pub fn end_or(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.unwrap_or(today)
    }
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

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Summarization call pacing
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff step after a rate-limited call (seconds)
    #[serde(rename = "backoff-secs", default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Minimum spacing between provider calls (milliseconds)
    #[serde(rename = "min-spacing-ms", default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,

    /// Upper bound of articles folded into one digest prompt
    #[serde(rename = "max-articles", default = "default_max_articles")]
    pub max_articles: usize,
}

impl SummarizerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_step: Duration::from_secs(self.backoff_secs),
            min_spacing: Duration::from_millis(self.min_spacing_ms),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            min_spacing_ms: default_min_spacing_ms(),
            max_articles: default_max_articles(),
        }
    }
}

/// One news source and its date-partitioned sitemaps
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Stable source identifier stored with every article
    pub id: String,

    /// Sitemap partition granularity: daily, monthly or yearly
    pub cadence: String,

    /// Sitemap url templates with `{year}`, `{month}` and `{day}` placeholders
    #[serde(rename = "sitemap-patterns")]
    pub sitemap_patterns: Vec<String>,

    /// Extractor registry key
    #[serde(default)]
    pub extractor: Option<String>,
}

impl SourceEntry {
    pub fn extractor_key(&self) -> &str {
        self.extractor.as_deref().unwrap_or(DEFAULT_EXTRACTOR)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> u64 {
    12
}

fn default_min_spacing_ms() -> u64 {
    6500
}

fn default_max_articles() -> usize {
    15
}
