//! Request-level url deduplication
//!
//! The filter holds a snapshot of the urls already archived for one source,
//! taken once when the run starts. Urls stored later in the same run (or by
//! a concurrent run) are only deduplicated from the next run on.

use crate::storage::ArticleStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Whether a page fetch may be dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    Allow,
    Suppress,
}

/// Gates page fetches against the known-url snapshot of one source
#[derive(Debug)]
pub struct DedupRequestFilter {
    source_id: String,
    /// `None` when dedup is disabled or the snapshot could not be loaded
    snapshot: Option<HashSet<String>>,
    suppressed: AtomicU64,
}

impl DedupRequestFilter {
    /// Loads the snapshot from the store
    ///
    /// If the store cannot list its urls the filter fails open: every
    /// request is allowed and a warning is logged.
    pub fn load<S: ArticleStore>(store: &S, source_id: &str) -> Self {
        let snapshot = match store.list_known_urls(Some(source_id)) {
            Ok(urls) => {
                tracing::info!(
                    "Already harvested {} urls for source: {}",
                    urls.len(),
                    source_id
                );
                Some(urls)
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load known urls for {}: {}; allowing all requests",
                    source_id,
                    e
                );
                None
            }
        };

        Self {
            source_id: source_id.to_string(),
            snapshot,
            suppressed: AtomicU64::new(0),
        }
    }

    /// Builds a filter from an explicit url set
    pub fn from_urls<I>(source_id: &str, urls: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            source_id: source_id.to_string(),
            snapshot: Some(urls.into_iter().collect()),
            suppressed: AtomicU64::new(0),
        }
    }

    /// A filter that allows every request
    pub fn disabled(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            snapshot: None,
            suppressed: AtomicU64::new(0),
        }
    }

    /// Decides whether the fetch of `url` proceeds
    pub fn check(&self, url: &str) -> FetchDecision {
        match &self.snapshot {
            Some(known) if known.contains(url) => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(
                    source_id = %self.source_id,
                    "Ignoring request (already harvested): {}",
                    url
                );
                FetchDecision::Suppress
            }
            _ => FetchDecision::Allow,
        }
    }

    /// True when the filter lets everything through
    pub fn is_fail_open(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.as_ref().map(HashSet::len).unwrap_or(0)
    }

    /// Number of requests suppressed so far
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        ArticleFilter, ArticleRecord, SqliteArticleStore, StorageError, StorageResult,
        StoreStatistics, StoredArticle,
    };
    use chrono::{DateTime, Utc};

    /// Store whose every read fails
    struct UnreachableStore;

    impl ArticleStore for UnreachableStore {
        fn insert_if_absent(&self, _: &ArticleRecord, _: &str) -> StorageResult<bool> {
            Ok(false)
        }
        fn query(&self, _: &ArticleFilter, _: u32, _: u32) -> StorageResult<Vec<StoredArticle>> {
            Err(StorageError::Database("unreachable".to_string()))
        }
        fn scan(
            &self,
            _: &ArticleFilter,
            _: &mut dyn FnMut(&StoredArticle) -> std::io::Result<()>,
        ) -> StorageResult<u64> {
            Err(StorageError::Database("unreachable".to_string()))
        }
        fn count(&self, _: &ArticleFilter) -> StorageResult<u64> {
            Err(StorageError::Database("unreachable".to_string()))
        }
        fn list_known_urls(&self, _: Option<&str>) -> StorageResult<HashSet<String>> {
            Err(StorageError::Database("unreachable".to_string()))
        }
        fn aggregate_stats(&self) -> StorageResult<StoreStatistics> {
            Err(StorageError::Database("unreachable".to_string()))
        }
        fn latest_published(&self, _: &str) -> StorageResult<Option<DateTime<Utc>>> {
            Err(StorageError::Database("unreachable".to_string()))
        }
    }

    #[test]
    fn test_known_urls_are_always_suppressed() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .insert_if_absent(&ArticleRecord::new(format!("https://a.test/{}", i)), "A")
                .unwrap();
        }
        store
            .insert_if_absent(&ArticleRecord::new("https://b.test/0"), "B")
            .unwrap();

        let filter = DedupRequestFilter::load(&store, "A");

        for _ in 0..2 {
            for i in 0..5 {
                assert_eq!(
                    filter.check(&format!("https://a.test/{}", i)),
                    FetchDecision::Suppress
                );
            }
        }
        assert_eq!(filter.check("https://a.test/new"), FetchDecision::Allow);
        assert_eq!(filter.check("https://b.test/0"), FetchDecision::Allow);
        assert_eq!(filter.suppressed(), 10);
        assert_eq!(filter.snapshot_len(), 5);
    }

    #[test]
    fn test_snapshot_is_not_refreshed_mid_run() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        let filter = DedupRequestFilter::load(&store, "A");

        store
            .insert_if_absent(&ArticleRecord::new("https://a.test/late"), "A")
            .unwrap();

        assert_eq!(filter.check("https://a.test/late"), FetchDecision::Allow);
    }

    #[test]
    fn test_snapshot_failure_fails_open() {
        let filter = DedupRequestFilter::load(&UnreachableStore, "A");

        assert!(filter.is_fail_open());
        assert_eq!(filter.check("https://a.test/1"), FetchDecision::Allow);
    }

    #[test]
    fn test_disabled_filter_allows_everything() {
        let filter = DedupRequestFilter::disabled("A");
        assert_eq!(filter.check("https://a.test/1"), FetchDecision::Allow);

        let explicit = DedupRequestFilter::from_urls("A", vec!["https://a.test/1".to_string()]);
        assert_eq!(explicit.check("https://a.test/1"), FetchDecision::Suppress);
    }
}
