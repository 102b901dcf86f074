//! CSV export of stored articles
//!
//! Rows are streamed from a single store snapshot, so exporting a large
//! archive holds one article in memory at a time and a harvest writing to
//! the same store cannot shift or duplicate rows.

use crate::storage::{
    format_timestamp, ArticleFilter, ArticleStore, StorageError, StoredArticle, ARTICLE_COLUMNS,
};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes every article matching `filter` to a CSV file at `path`
///
/// The header row is written even when nothing matches.
///
/// # Returns
///
/// * `Ok(u64)` - Number of data rows written
/// * `Err(HarvestError)` - The store query or the file write failed
pub fn export_csv<S: ArticleStore>(
    store: &S,
    filter: &ArticleFilter,
    path: &Path,
) -> Result<u64, HarvestError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let rows = write_csv(store, filter, &mut writer)?;
    writer.flush()?;

    tracing::info!("Exported {} articles to {}", rows, path.display());
    Ok(rows)
}

/// Streams matching articles as CSV into `out`
pub fn write_csv<S: ArticleStore, W: Write>(
    store: &S,
    filter: &ArticleFilter,
    out: &mut W,
) -> Result<u64, HarvestError> {
    write_row(out, ARTICLE_COLUMNS.iter().map(|c| c.to_string()))?;

    store
        .scan(filter, &mut |article| write_row(out, article_fields(article)))
        .map_err(|e| match e {
            StorageError::Scan(io) => HarvestError::Io(io),
            other => HarvestError::Storage(other),
        })
}

/// Field values in `ARTICLE_COLUMNS` order
fn article_fields(article: &StoredArticle) -> [String; 13] {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    let ts = |value: &Option<DateTime<Utc>>| value.as_ref().map(format_timestamp).unwrap_or_default();

    [
        article.id.to_string(),
        article.url.clone(),
        text(&article.title),
        text(&article.description),
        text(&article.author),
        text(&article.article_text),
        ts(&article.date_published),
        ts(&article.date_modified),
        ts(&article.fetched_at),
        ts(&article.parsed_at),
        article.paywall.map(|p| p.to_string()).unwrap_or_default(),
        article.source_id.clone(),
        format_timestamp(&article.stored_at),
    ]
}

fn write_row<W: Write, I: IntoIterator<Item = String>>(out: &mut W, fields: I) -> std::io::Result<()> {
    let line = fields
        .into_iter()
        .map(|f| escape_field(&f))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\r\n")
}

/// Quotes a field when it contains a separator, quote or line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
