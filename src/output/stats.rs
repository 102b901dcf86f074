//! Statistics reporting from the article store
//!
//! This module provides functionality for loading and displaying archive
//! statistics and per-run outcome counters.

use crate::crawler::RunSummary;
use crate::storage::{ArticleStore, StoreStatistics};
use crate::HarvestError;

/// Loads statistics from the store
pub fn load_statistics<S: ArticleStore>(store: &S) -> Result<StoreStatistics, HarvestError> {
    Ok(store.aggregate_stats()?)
}

/// Formats archive statistics as a plain-text report
pub fn format_statistics(stats: &StoreStatistics) -> String {
    let mut out = String::new();

    out.push_str("=== Archive Statistics ===\n\n");

    out.push_str("Overview:\n");
    out.push_str(&format!("  Total articles: {}\n", stats.total));
    match &stats.latest_stored_at {
        Some(ts) => out.push_str(&format!("  Last stored: {}\n", ts.format("%Y-%m-%d %H:%M:%S UTC"))),
        None => out.push_str("  Last stored: never\n"),
    }
    out.push('\n');

    if !stats.by_source.is_empty() {
        out.push_str("Articles by Source:\n");
        for (source_id, count) in &stats.by_source {
            let percentage = if stats.total > 0 {
                (*count as f64 / stats.total as f64) * 100.0
            } else {
                0.0
            };
            out.push_str(&format!("  {}: {} ({:.1}%)\n", source_id, count, percentage));
        }
        out.push('\n');
    }

    if !stats.by_day.is_empty() {
        out.push_str("Articles Published (last 30 days):\n");
        for (day, count) in &stats.by_day {
            out.push_str(&format!("  {}: {}\n", day, count));
        }
        out.push('\n');
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    print!("{}", format_statistics(stats));
}

/// One-line outcome of a harvest run for a source
pub fn format_run_summary(source_id: &str, summary: &RunSummary) -> String {
    format!(
        "{}: {} inserted, {} skipped (duplicate), {} rejected (invalid), {} suppressed, {} failed fetches",
        source_id,
        summary.inserted,
        summary.skipped_duplicate,
        summary.rejected_invalid,
        summary.suppressed,
        summary.failed_fetches
    )
}
