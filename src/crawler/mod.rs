//! Harvest module for sitemap planning, fetching and ingestion
//!
//! This module contains the core harvesting logic, including:
//! - Sitemap frontier planning per source cadence
//! - Request deduplication against already archived urls
//! - HTTP fetching and sitemap reading
//! - Record ingestion into the article store
//! - Overall run coordination

mod coordinator;
mod dedup;
mod fetcher;
mod frontier;
mod pipeline;

pub use coordinator::{run_harvest, Harvester};
pub use dedup::{DedupRequestFilter, FetchDecision};
pub use fetcher::{
    build_http_client, decode_sitemap_body, fetch_bytes, fetch_text, parse_sitemap,
    user_agent_string, SitemapDocument,
};
pub use frontier::{
    resolve_pattern, Cadence, CrawlMode, CrawlWindow, FrontierPlanner, ResumeState,
    SitemapFrontier, SitemapRequest, BOUNDED_RUN_SITEMAPS,
};
pub use pipeline::{IngestOutcome, IngestionPipeline, RunSummary};
