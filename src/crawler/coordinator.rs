//! Harvest coordinator - per-source run orchestration
//!
//! A run for one source goes through these stages:
//! - Plan the sitemap frontier (fatal on an unsupported cadence)
//! - Resolve the source's extractor (fatal when unknown)
//! - Acquire the article store (fatal when unreachable)
//! - Load the dedup snapshot (fails open)
//! - Fetch sitemaps newest first, gate page fetches through the dedup
//!   filter, extract, and commit through the ingestion pipeline
//!
//! Everything after setup is isolated per sitemap and per page: failures are
//! logged and counted, never propagated.

use crate::config::{Config, SourceEntry};
use crate::crawler::dedup::{DedupRequestFilter, FetchDecision};
use crate::crawler::fetcher::{
    build_http_client, decode_sitemap_body, fetch_bytes, fetch_text, parse_sitemap, SitemapDocument,
};
use crate::crawler::frontier::{CrawlMode, FrontierPlanner, SitemapRequest};
use crate::crawler::pipeline::{IngestionPipeline, RunSummary};
use crate::extract::{Extractor, ExtractorRegistry, Page};
use crate::storage::{open_storage, SqliteArticleStore};
use crate::HarvestError;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

/// Runs harvests for the sources of one configuration
pub struct Harvester {
    config: Arc<Config>,
    client: Client,
    registry: ExtractorRegistry,
}

impl Harvester {
    /// Creates a harvester with the default extractor registry
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        Self::with_registry(config, ExtractorRegistry::with_defaults())
    }

    pub fn with_registry(config: Config, registry: ExtractorRegistry) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent)?;
        Ok(Self {
            config: Arc::new(config),
            client,
            registry,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn database_path(&self) -> &Path {
        Path::new(&self.config.output.database_path)
    }

    fn planner(&self, source: &SourceEntry, mode: CrawlMode) -> Result<FrontierPlanner, HarvestError> {
        FrontierPlanner::from_config(source, &self.config.harvest, mode, today())
    }

    /// Lists the sitemap targets a run would fetch, without fetching anything
    ///
    /// Update mode reads the resume point from the store when one exists.
    pub fn plan_source(
        &self,
        source: &SourceEntry,
        mode: CrawlMode,
    ) -> Result<Vec<SitemapRequest>, HarvestError> {
        let planner = self.planner(source, mode)?;

        if mode == CrawlMode::Update && self.database_path().exists() {
            let store = open_storage(self.database_path())?;
            return Ok(planner.plan_from_store(&store).collect());
        }
        Ok(planner.plan(None).collect())
    }

    /// Harvests every configured source, or only those named in `only`
    ///
    /// Stops at the first source whose setup fails.
    pub async fn harvest_all(
        &self,
        mode: CrawlMode,
        only: &[String],
    ) -> Result<Vec<(String, RunSummary)>, HarvestError> {
        let mut results = Vec::new();

        for source in &self.config.sources {
            if !only.is_empty() && !only.contains(&source.id) {
                continue;
            }
            let summary = self.harvest_source(source, mode).await?;
            results.push((source.id.clone(), summary));
        }

        Ok(results)
    }

    /// Runs one harvest for `source`
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run finished or hit its item-count cap
    /// * `Err(HarvestError)` - A setup fault aborted the run before any fetch
    pub async fn harvest_source(
        &self,
        source: &SourceEntry,
        mode: CrawlMode,
    ) -> Result<RunSummary, HarvestError> {
        let planner = self.planner(source, mode)?;
        let extractor = self.registry.get(source.extractor_key())?;
        let pipeline = IngestionPipeline::open(self.database_path(), &source.id)?;

        let frontier: Vec<SitemapRequest> = planner.plan_from_store(pipeline.store()).collect();
        let dedup = if self.config.harvest.skip_known_urls {
            DedupRequestFilter::load(pipeline.store(), &source.id)
        } else {
            DedupRequestFilter::disabled(&source.id)
        };

        let mut run = SourceRun {
            client: &self.client,
            extractor,
            dedup: &dedup,
            pipeline,
            cap: u64::from(self.config.harvest.item_count_cap),
        };

        tracing::info!(
            source_id = %source.id,
            "Starting {:?} harvest: {} sitemaps, extractor {}",
            mode,
            frontier.len(),
            extractor.name()
        );

        for request in &frontier {
            if run.cap_reached() {
                tracing::info!(source_id = %source.id, "Item count cap of {} reached", run.cap);
                break;
            }
            run.process_sitemap(&request.url).await;
        }

        let mut summary = run.pipeline.finish();
        summary.suppressed = dedup.suppressed();

        tracing::info!(
            source_id = %source.id,
            "Harvest finished: {} inserted, {} duplicates, {} invalid, {} suppressed, {} failed fetches",
            summary.inserted,
            summary.skipped_duplicate,
            summary.rejected_invalid,
            summary.suppressed,
            summary.failed_fetches
        );

        Ok(summary)
    }
}

/// State of one in-flight source run
struct SourceRun<'a> {
    client: &'a Client,
    extractor: &'a dyn Extractor,
    dedup: &'a DedupRequestFilter,
    pipeline: IngestionPipeline<SqliteArticleStore>,
    cap: u64,
}

impl SourceRun<'_> {
    fn cap_reached(&self) -> bool {
        self.cap > 0 && self.pipeline.summary().processed() >= self.cap
    }

    fn source_id(&self) -> &str {
        self.pipeline.source_id()
    }

    /// Fetches one sitemap target and ingests its pages
    ///
    /// Sitemap indexes are followed one level deep.
    async fn process_sitemap(&mut self, url: &str) {
        match self.fetch_sitemap(url).await {
            Some(SitemapDocument::Index(children)) => {
                tracing::debug!("Sitemap index {} lists {} sitemaps", url, children.len());
                for child in children {
                    if self.cap_reached() {
                        return;
                    }
                    match self.fetch_sitemap(&child).await {
                        Some(SitemapDocument::Urlset(pages)) => self.process_pages(pages).await,
                        Some(SitemapDocument::Index(nested)) => {
                            tracing::warn!(
                                "Ignoring nested sitemap index {} ({} entries)",
                                child,
                                nested.len()
                            );
                        }
                        None => {}
                    }
                }
            }
            Some(SitemapDocument::Urlset(pages)) => self.process_pages(pages).await,
            None => {}
        }
    }

    async fn fetch_sitemap(&mut self, url: &str) -> Option<SitemapDocument> {
        let body = fetch_bytes(self.client, url).await;
        match body.and_then(|bytes| decode_sitemap_body(&bytes)) {
            Ok(xml) => {
                let document = parse_sitemap(&xml);
                tracing::debug!("Sitemap {} lists {} entries", url, document.len());
                Some(document)
            }
            Err(e) => {
                tracing::warn!(source_id = %self.source_id(), "Failed to fetch sitemap {}: {}", url, e);
                self.pipeline.record_fetch_failure();
                None
            }
        }
    }

    async fn process_pages(&mut self, pages: Vec<String>) {
        for page_url in pages {
            if self.cap_reached() {
                return;
            }
            self.process_page(&page_url).await;
        }
    }

    async fn process_page(&mut self, url: &str) {
        if self.dedup.check(url) == FetchDecision::Suppress {
            return;
        }

        let html = match fetch_text(self.client, url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(source_id = %self.source_id(), "Failed to fetch page {}: {}", url, e);
                self.pipeline.record_fetch_failure();
                return;
            }
        };

        let page = Page::new(url, html);
        match self.extractor.extract(&page) {
            Ok(record) => {
                let source_id = self.source_id().to_string();
                self.pipeline.ingest(&record, &source_id);
            }
            Err(e) => {
                tracing::warn!(source_id = %self.source_id(), "Skipping page: {}", e);
            }
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Runs a complete harvest of the configured sources
///
/// This is the main entry point for a harvest. For each selected source it
/// plans the sitemap frontier, opens the article store, loads the dedup
/// snapshot, then fetches, extracts and stores articles.
///
/// # Returns
///
/// * `Ok(Vec<(String, RunSummary)>)` - Per-source outcome counters
/// * `Err(HarvestError)` - A setup fault aborted the harvest
pub async fn run_harvest(
    config: Config,
    mode: CrawlMode,
    only: &[String],
) -> Result<Vec<(String, RunSummary)>, HarvestError> {
    let harvester = Harvester::new(config)?;
    harvester.harvest_all(mode, only).await
}
