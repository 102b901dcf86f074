//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ArticleStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArticleStore, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, parse_timestamp, ArticleFilter, ArticleRecord, StoreStatistics,
    StoredArticle,
};
use crate::HarvestError;
use chrono::{DateTime, Days, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const SELECT_ARTICLE: &str = "SELECT id, url, title, description, author, article_text,
     date_published, date_modified, fetched_at, parsed_at, paywall, source_id, stored_at
     FROM articles";

const ORDER_NEWEST_FIRST: &str =
    "ORDER BY date_published IS NULL, date_published DESC, id DESC";

/// Trailing window covered by the per-day statistics
const STATS_WINDOW_DAYS: u64 = 30;

/// SQLite article store
///
/// Each handle owns one connection. Several handles may point at the same
/// file: WAL mode keeps readers unblocked, and the `UNIQUE(url)` constraint
/// arbitrates concurrent inserts of the same article.
pub struct SqliteArticleStore {
    conn: Connection,
}

impl SqliteArticleStore {
    /// Opens or creates the store at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteArticleStore)` - Successfully opened/created database
    /// * `Err(HarvestError::StorageUnavailable)` - Failed to open the database
    pub fn open(path: &Path) -> Result<Self, HarvestError> {
        let unavailable = |source| HarvestError::StorageUnavailable {
            path: path.display().to_string(),
            source,
        };

        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(unavailable)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(unavailable)?;

        initialize_schema(&conn).map_err(unavailable)?;

        tracing::debug!("Opened article store at {}", path.display());
        Ok(Self { conn })
    }

    /// Creates an in-memory store (for tests and dry runs)
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let unavailable = |source| HarvestError::StorageUnavailable {
            path: ":memory:".to_string(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        initialize_schema(&conn).map_err(unavailable)?;
        Ok(Self { conn })
    }

    /// Computes statistics with the trailing window anchored at `now`
    pub fn aggregate_stats_at(&self, now: DateTime<Utc>) -> StorageResult<StoreStatistics> {
        // One read transaction so all figures describe the same snapshot
        let tx = self.conn.unchecked_transaction()?;

        let total: i64 = tx.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;

        let by_source = {
            let mut stmt = tx.prepare(
                "SELECT source_id, COUNT(*) AS count FROM articles
                 GROUP BY source_id ORDER BY count DESC, source_id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let today = now.date_naive();
        let cutoff = today
            .checked_sub_days(Days::new(STATS_WINDOW_DAYS))
            .unwrap_or(NaiveDate::MIN);
        // Future-dated articles fall outside the trailing window
        let tomorrow = today.succ_opt().unwrap_or(NaiveDate::MAX);

        let by_day = {
            let mut stmt = tx.prepare(
                "SELECT substr(date_published, 1, 10) AS day, COUNT(*) FROM articles
                 WHERE date_published IS NOT NULL
                   AND date_published >= ?1 AND date_published < ?2
                 GROUP BY day ORDER BY day DESC",
            )?;
            let rows = stmt
                .query_map(params![cutoff.to_string(), tomorrow.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .filter_map(|(day, count)| {
                    NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                        .ok()
                        .map(|day| (day, count))
                })
                .collect()
        };

        let latest: Option<String> =
            tx.query_row("SELECT MAX(stored_at) FROM articles", [], |row| row.get(0))?;

        tx.commit()?;

        Ok(StoreStatistics {
            total: total as u64,
            by_source,
            by_day,
            latest_stored_at: latest.as_deref().and_then(parse_timestamp),
        })
    }
}

impl ArticleStore for SqliteArticleStore {
    fn insert_if_absent(&self, record: &ArticleRecord, source_id: &str) -> StorageResult<bool> {
        let url = record.identity().ok_or_else(|| StorageError::InvalidRecord {
            reason: "record has no url".to_string(),
        })?;

        let stamp = |ts: &Option<DateTime<Utc>>| ts.as_ref().map(format_timestamp);
        let now = format_timestamp(&Utc::now());

        let result = self.conn.execute(
            "INSERT OR IGNORE INTO articles
             (url, title, description, author, article_text, date_published, date_modified,
              fetched_at, parsed_at, paywall, source_id, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                url,
                record.title,
                record.description,
                record.author,
                record.article_text,
                stamp(&record.date_published),
                stamp(&record.date_modified),
                stamp(&record.fetched_at),
                stamp(&record.parsed_at),
                record.paywall,
                source_id,
                now,
            ],
        );

        match result {
            Ok(changed) => Ok(changed > 0),
            Err(e) => {
                tracing::error!(url, source_id, "Failed to insert article: {}", e);
                Ok(false)
            }
        }
    }

    fn query(
        &self,
        filter: &ArticleFilter,
        limit: u32,
        offset: u32,
    ) -> StorageResult<Vec<StoredArticle>> {
        let (clause, mut values) = where_clause(filter);
        let sql = format!(
            "{} {} {} LIMIT ? OFFSET ?",
            SELECT_ARTICLE, clause, ORDER_NEWEST_FIRST
        );
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let articles = stmt
            .query_map(params_from_iter(values), read_article)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(articles)
    }

    fn scan(
        &self,
        filter: &ArticleFilter,
        visit: &mut dyn FnMut(&StoredArticle) -> std::io::Result<()>,
    ) -> StorageResult<u64> {
        let (clause, values) = where_clause(filter);
        let sql = format!("{} {} {}", SELECT_ARTICLE, clause, ORDER_NEWEST_FIRST);

        let tx = self.conn.unchecked_transaction()?;
        let mut visited = 0u64;
        {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(values))?;
            while let Some(row) = rows.next()? {
                visit(&read_article(row)?)?;
                visited += 1;
            }
        }
        tx.commit()?;

        Ok(visited)
    }

    fn count(&self, filter: &ArticleFilter) -> StorageResult<u64> {
        let (clause, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM articles {}", clause);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn list_known_urls(&self, source_id: Option<&str>) -> StorageResult<HashSet<String>> {
        let urls = match source_id {
            Some(source_id) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT url FROM articles WHERE source_id = ?1")?;
                let urls = stmt
                    .query_map(params![source_id], |row| row.get(0))?
                    .collect::<Result<HashSet<String>, _>>()?;
                urls
            }
            None => {
                let mut stmt = self.conn.prepare("SELECT url FROM articles")?;
                let urls = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<HashSet<String>, _>>()?;
                urls
            }
        };

        Ok(urls)
    }

    fn aggregate_stats(&self) -> StorageResult<StoreStatistics> {
        self.aggregate_stats_at(Utc::now())
    }

    fn latest_published(&self, source_id: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let latest: Option<String> = self.conn.query_row(
            "SELECT MAX(date_published) FROM articles WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(latest.as_deref().and_then(parse_timestamp))
    }
}

/// Builds the WHERE clause and its positional parameters for a filter
fn where_clause(filter: &ArticleFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(source_id) = &filter.source_id {
        conditions.push("source_id = ?");
        values.push(Value::Text(source_id.clone()));
    }

    // LIKE folds case for ASCII letters only
    if let Some(text) = &filter.text_query {
        conditions.push(
            "(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' \
             OR article_text LIKE ? ESCAPE '\\')",
        );
        let pattern = format!("%{}%", escape_like(text));
        for _ in 0..3 {
            values.push(Value::Text(pattern.clone()));
        }
    }

    if let Some(start) = filter.date_range.start {
        conditions.push("date_published >= ?");
        values.push(Value::Text(start.to_string()));
    }

    if let Some(end) = filter.date_range.end_exclusive() {
        conditions.push("date_published < ?");
        values.push(Value::Text(end.to_string()));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (clause, values)
}

/// Escapes LIKE wildcards so user text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn read_article(row: &Row<'_>) -> rusqlite::Result<StoredArticle> {
    let stored_at = timestamp_column(row, 12)?
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(12, "stored_at".to_string(), Type::Text))?;

    Ok(StoredArticle {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        author: row.get(4)?,
        article_text: row.get(5)?,
        date_published: timestamp_column(row, 6)?,
        date_modified: timestamp_column(row, 7)?,
        fetched_at: timestamp_column(row, 8)?,
        parsed_at: timestamp_column(row, 9)?,
        paywall: row.get(10)?,
        source_id: row.get(11)?,
        stored_at,
    })
}
