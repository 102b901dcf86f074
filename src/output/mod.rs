//! Output module for archive reports and exports
//!
//! This module handles:
//! - Printing archive statistics and per-run summaries
//! - Exporting stored articles as CSV

mod export;
pub mod stats;

pub use export::{export_csv, write_csv};
pub use stats::{format_run_summary, format_statistics, load_statistics, print_statistics};
