//! Ingestion pipeline
//!
//! Receives extracted records and writes them through the article store,
//! keeping per-run outcome counters. The pipeline owns its store handle, so
//! the handle is released whenever the pipeline is dropped: normal finish,
//! an early `?` return, a panic, or a cancelled task.

use crate::storage::{ArticleRecord, ArticleStore, SqliteArticleStore, StorageError};
use crate::HarvestError;
use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc;

/// Outcome of committing one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    SkippedDuplicate,
    RejectedInvalid,
}

/// Per-run counters reported to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub inserted: u64,
    pub skipped_duplicate: u64,
    pub rejected_invalid: u64,
    /// Page fetches suppressed by the dedup filter
    pub suppressed: u64,
    /// Sitemap or page fetches that failed
    pub failed_fetches: u64,
}

impl RunSummary {
    /// Records that reached the store (any outcome)
    pub fn processed(&self) -> u64 {
        self.inserted + self.skipped_duplicate + self.rejected_invalid
    }

    pub fn merge(&mut self, other: &RunSummary) {
        self.inserted += other.inserted;
        self.skipped_duplicate += other.skipped_duplicate;
        self.rejected_invalid += other.rejected_invalid;
        self.suppressed += other.suppressed;
        self.failed_fetches += other.failed_fetches;
    }
}

/// Commits records for one source into the store
pub struct IngestionPipeline<S: ArticleStore> {
    store: S,
    source_id: String,
    summary: RunSummary,
    finished: bool,
}

impl IngestionPipeline<SqliteArticleStore> {
    /// Acquires a store handle at `path` for the run
    pub fn open(path: &Path, source_id: &str) -> Result<Self, HarvestError> {
        let store = SqliteArticleStore::open(path)?;
        Ok(Self::new(store, source_id))
    }
}

impl<S: ArticleStore> IngestionPipeline<S> {
    pub fn new(store: S, source_id: &str) -> Self {
        Self {
            store,
            source_id: source_id.to_string(),
            summary: RunSummary::default(),
            finished: false,
        }
    }

    /// Read access to the held store (resume lookup, dedup snapshot)
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Commits one record; faults are counted, never raised
    pub fn ingest(&mut self, record: &ArticleRecord, source_id: &str) -> IngestOutcome {
        let url = record.url.as_deref().unwrap_or("<missing>");

        match self.store.insert_if_absent(record, source_id) {
            Ok(true) => {
                self.summary.inserted += 1;
                tracing::debug!(source_id, "Inserted article: {}", url);
                IngestOutcome::Inserted
            }
            Ok(false) => {
                self.summary.skipped_duplicate += 1;
                tracing::debug!(source_id, "Skipped duplicate article: {}", url);
                IngestOutcome::SkippedDuplicate
            }
            Err(StorageError::InvalidRecord { reason }) => {
                self.summary.rejected_invalid += 1;
                tracing::debug!(source_id, "Rejected invalid record ({}): {}", reason, url);
                IngestOutcome::RejectedInvalid
            }
            Err(e) => {
                self.summary.rejected_invalid += 1;
                tracing::debug!(source_id, "Rejected record: {}: {}", url, e);
                IngestOutcome::RejectedInvalid
            }
        }
    }

    pub fn record_fetch_failure(&mut self) {
        self.summary.failed_fetches += 1;
    }

    /// Drains records from the fetch engine until the channel closes
    pub async fn run(mut self, mut records: mpsc::Receiver<(ArticleRecord, String)>) -> RunSummary {
        while let Some((record, source_id)) = records.recv().await {
            self.ingest(&record, &source_id);
        }
        self.finish()
    }

    /// Ends the run, releasing the store handle
    pub fn finish(mut self) -> RunSummary {
        self.finished = true;
        self.summary
    }
}

impl<S: ArticleStore> Drop for IngestionPipeline<S> {
    fn drop(&mut self) {
        if self.finished {
            tracing::debug!("Released article store handle for {}", self.source_id);
        } else {
            tracing::warn!(
                "Ingestion for {} stopped after {} records; releasing article store handle",
                self.source_id,
                self.summary.processed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        ArticleFilter, StorageResult, StoreStatistics, StoredArticle,
    };
    use chrono::{DateTime, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Wraps the SQLite store and flags when it is dropped
    struct TrackedStore {
        inner: SqliteArticleStore,
        released: Arc<AtomicBool>,
    }

    impl Drop for TrackedStore {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl ArticleStore for TrackedStore {
        fn insert_if_absent(&self, record: &ArticleRecord, source_id: &str) -> StorageResult<bool> {
            self.inner.insert_if_absent(record, source_id)
        }
        fn query(&self, f: &ArticleFilter, l: u32, o: u32) -> StorageResult<Vec<StoredArticle>> {
            self.inner.query(f, l, o)
        }
        fn scan(
            &self,
            f: &ArticleFilter,
            v: &mut dyn FnMut(&StoredArticle) -> std::io::Result<()>,
        ) -> StorageResult<u64> {
            self.inner.scan(f, v)
        }
        fn count(&self, f: &ArticleFilter) -> StorageResult<u64> {
            self.inner.count(f)
        }
        fn list_known_urls(&self, s: Option<&str>) -> StorageResult<HashSet<String>> {
            self.inner.list_known_urls(s)
        }
        fn aggregate_stats(&self) -> StorageResult<StoreStatistics> {
            self.inner.aggregate_stats()
        }
        fn latest_published(&self, s: &str) -> StorageResult<Option<DateTime<Utc>>> {
            self.inner.latest_published(s)
        }
    }

    fn tracked() -> (TrackedStore, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let store = TrackedStore {
            inner: SqliteArticleStore::open_in_memory().unwrap(),
            released: released.clone(),
        };
        (store, released)
    }

    #[test]
    fn test_counters_track_outcomes() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        let mut pipeline = IngestionPipeline::new(store, "A");

        let record = ArticleRecord::new("https://a.test/1");
        assert_eq!(pipeline.ingest(&record, "A"), IngestOutcome::Inserted);
        assert_eq!(pipeline.ingest(&record, "A"), IngestOutcome::SkippedDuplicate);
        assert_eq!(
            pipeline.ingest(&ArticleRecord::default(), "A"),
            IngestOutcome::RejectedInvalid
        );

        let summary = pipeline.finish();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped_duplicate, 1);
        assert_eq!(summary.rejected_invalid, 1);
        assert_eq!(summary.processed(), 3);
    }

    #[test]
    fn test_handle_released_on_finish() {
        let (store, released) = tracked();
        let pipeline = IngestionPipeline::new(store, "A");

        pipeline.finish();

        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_handle_released_on_panic() {
        let (store, released) = tracked();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut pipeline = IngestionPipeline::new(store, "A");
            pipeline.ingest(&ArticleRecord::new("https://a.test/1"), "A");
            panic!("extractor blew up");
        }));

        assert!(result.is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let store = SqliteArticleStore::open_in_memory().unwrap();
        let pipeline = IngestionPipeline::new(store, "A");
        let (tx, rx) = mpsc::channel(8);

        let task = tokio::spawn(pipeline.run(rx));
        for i in 0..5 {
            tx.send((ArticleRecord::new(format!("https://a.test/{}", i)), "A".to_string()))
                .await
                .unwrap();
        }
        tx.send((ArticleRecord::new("https://a.test/0"), "A".to_string()))
            .await
            .unwrap();
        drop(tx);

        let summary = task.await.unwrap();
        assert_eq!(summary.inserted, 5);
        assert_eq!(summary.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn test_handle_released_on_cancellation() {
        let (store, released) = tracked();
        let pipeline = IngestionPipeline::new(store, "A");
        let (tx, rx) = mpsc::channel(8);

        tx.send((ArticleRecord::new("https://a.test/1"), "A".to_string()))
            .await
            .unwrap();
        let task = tokio::spawn(pipeline.run(rx));
        tokio::task::yield_now().await;

        task.abort();
        let _ = task.await;

        assert!(released.load(Ordering::SeqCst));
        drop(tx);
    }
}
