//! Storage module for the article archive
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent, url-keyed article inserts
//! - Filtered and paginated article queries
//! - Known-url listing for request deduplication
//! - Aggregate archive statistics

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, ARTICLE_COLUMNS};
pub use sqlite::SqliteArticleStore;
pub use traits::{ArticleStore, StorageError, StorageResult};

use crate::HarvestError;
use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

/// Opens (or creates) the article store at the given path
///
/// # Returns
///
/// * `Ok(SqliteArticleStore)` - Successfully opened store
/// * `Err(HarvestError::StorageUnavailable)` - The database could not be opened
pub fn open_storage(path: &Path) -> Result<SqliteArticleStore, HarvestError> {
    SqliteArticleStore::open(path)
}

/// An article as produced by an extractor, before it is stored
///
/// Only `url` is required for storage; every other field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub article_text: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub parsed_at: Option<DateTime<Utc>>,
    pub paywall: Option<bool>,
}

impl ArticleRecord {
    /// Creates a record carrying only a url
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Returns the url if it is present and not blank
    pub fn identity(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// An article row as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredArticle {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub article_text: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub parsed_at: Option<DateTime<Utc>>,
    pub paywall: Option<bool>,
    pub source_id: String,
    pub stored_at: DateTime<Utc>,
}

/// Inclusive publication-date range; either bound may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Exclusive upper key for the end bound (the day after `end`)
    pub(crate) fn end_exclusive(&self) -> Option<NaiveDate> {
        self.end.and_then(|end| end.checked_add_days(Days::new(1)))
    }
}

/// Filter set shared by `query`, `count` and the bulk export
///
/// All filters combine with AND. The text query matches title, description
/// or article text, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub source_id: Option<String>,
    pub text_query: Option<String>,
    pub date_range: DateRange,
}

impl ArticleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn text(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.text_query = if query.trim().is_empty() {
            None
        } else {
            Some(query)
        };
        self
    }

    pub fn published_between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.date_range = DateRange::new(start, end);
        self
    }
}

/// Aggregate statistics over the whole archive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStatistics {
    /// Total number of stored articles
    pub total: u64,

    /// Article count per source, largest first
    pub by_source: Vec<(String, u64)>,

    /// Article count per publication day over the trailing 30 days, newest first
    pub by_day: Vec<(NaiveDate, u64)>,

    /// Most recent `stored_at` timestamp
    pub latest_stored_at: Option<DateTime<Utc>>,
}

impl StoreStatistics {
    /// Returns the stored article count for one source
    pub fn source_count(&self, source_id: &str) -> u64 {
        self.by_source
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Formats a timestamp the way it is persisted
///
/// A single fixed-width UTC format keeps lexical and chronological order equal.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a persisted timestamp, accepting RFC 3339 or a bare `YYYY-MM-DD` date
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_identity_rejects_blank_url() {
        assert_eq!(ArticleRecord::default().identity(), None);
        assert_eq!(ArticleRecord::new("   ").identity(), None);
        assert_eq!(
            ArticleRecord::new(" https://example.com/a ").identity(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_timestamp_format_is_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(format_timestamp(&early), "2024-01-09T23:00:00Z");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-02-15"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-15T05:30:00+05:30"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_blank_text_query_is_dropped() {
        let filter = ArticleFilter::new().text("  ");
        assert_eq!(filter.text_query, None);
    }

    #[test]
    fn test_end_exclusive_is_next_day() {
        let range = DateRange::new(None, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(range.end_exclusive(), NaiveDate::from_ymd_opt(2024, 2, 1));
    }
}
