//! News-Harvest: an incremental sitemap harvester for news archives
//!
//! This crate plans which date-partitioned sitemaps to fetch for each news
//! source, skips article URLs that are already archived, and commits newly
//! extracted articles into a unique-keyed SQLite store.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod storage;
pub mod summarize;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Article store unavailable at {path}: {source}")]
    StorageUnavailable {
        path: String,
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Unsupported sitemap cadence: {0}")]
    UnsupportedCadence(String),

    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Extraction failed for {url}: {message}")]
    Extract { url: String, message: String },

    #[error("No extractor registered under '{0}'")]
    UnknownExtractor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid date in config: {0}")]
    InvalidDate(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Cadence, CrawlMode, CrawlWindow, FrontierPlanner, RunSummary, SitemapRequest};
pub use storage::{ArticleFilter, ArticleRecord, ArticleStore, SqliteArticleStore, StoredArticle};
