//! Storage traits and error types
//!
//! This module defines the trait interface for article store backends and
//! associated error types.

use crate::storage::{ArticleFilter, ArticleRecord, StoreStatistics, StoredArticle};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Scan aborted: {0}")]
    Scan(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for article store implementations
///
/// Every operation runs in its own transaction scope. Inserts commit
/// independently, so an interrupted harvest leaves exactly the inserts that
/// already returned.
pub trait ArticleStore {
    /// Inserts the record unless an article with the same url exists
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A new row was created
    /// * `Ok(false)` - The url was already stored, or the write failed (logged)
    /// * `Err(StorageError::InvalidRecord)` - The record has no url; nothing was written
    fn insert_if_absent(&self, record: &ArticleRecord, source_id: &str) -> StorageResult<bool>;

    /// Returns one page of matching articles, newest publication date first
    ///
    /// Articles without a publication date sort last. The text filter is a
    /// substring match over title, description and body that ignores case
    /// for ASCII letters only: `"é"` does not match `"É"`.
    fn query(
        &self,
        filter: &ArticleFilter,
        limit: u32,
        offset: u32,
    ) -> StorageResult<Vec<StoredArticle>>;

    /// Visits every matching article in `query` order from one read snapshot
    ///
    /// Articles stored while the scan runs are not visited, and none is
    /// visited twice. An error from `visit` stops the scan and is returned as
    /// `StorageError::Scan`.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Number of articles visited
    fn scan(
        &self,
        filter: &ArticleFilter,
        visit: &mut dyn FnMut(&StoredArticle) -> std::io::Result<()>,
    ) -> StorageResult<u64>;

    /// Counts the articles `query` would return, ignoring pagination
    fn count(&self, filter: &ArticleFilter) -> StorageResult<u64>;

    /// Lists every stored url, optionally restricted to one source
    fn list_known_urls(&self, source_id: Option<&str>) -> StorageResult<HashSet<String>>;

    /// Computes totals, per-source counts, trailing 30-day counts and last store time
    fn aggregate_stats(&self) -> StorageResult<StoreStatistics>;

    /// Latest publication timestamp stored for a source
    fn latest_published(&self, source_id: &str) -> StorageResult<Option<DateTime<Utc>>>;
}
