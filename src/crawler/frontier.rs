//! Sitemap frontier planning
//!
//! This module decides which date-partitioned sitemaps a harvest run fetches:
//! - Partition dates are stepped by the source's cadence across the crawl window
//! - Partitions are emitted newest first, so an interrupted run has already
//!   covered the freshest content
//! - `update` mode narrows the window start to the newest stored article
//! - Every run emits at least one partition, even for an empty window
//! - A configured item-count cap bounds the run to three sitemaps

use crate::config::{HarvestConfig, SourceEntry};
use crate::storage::ArticleStore;
use crate::HarvestError;
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Number of sitemap targets emitted when an item-count cap is configured
pub const BOUNDED_RUN_SITEMAPS: usize = 3;

/// Time granularity of a source's sitemap partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    Daily,
    Monthly,
    Yearly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// The partition date `steps` cadence units after `origin`
    ///
    /// Always stepped from the origin so month-end clamping never drifts.
    fn step(&self, origin: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => origin.checked_add_days(Days::new(u64::from(steps))),
            Self::Monthly => origin.checked_add_months(Months::new(steps)),
            Self::Yearly => origin.checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }
}

impl FromStr for Cadence {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(HarvestError::UnsupportedCadence(s.to_string())),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a run walks the whole window or resumes from stored articles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    #[default]
    Full,
    Update,
}

/// Inclusive date window plus the cadence it is partitioned by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cadence: Cadence,
}

impl CrawlWindow {
    /// Builds a window, failing on an unrecognized cadence
    pub fn new(start: NaiveDate, end: NaiveDate, cadence: &str) -> Result<Self, HarvestError> {
        Ok(Self {
            start,
            end,
            cadence: cadence.parse()?,
        })
    }
}

/// Newest publication date already archived for a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    pub source_id: String,
    pub latest_published: Option<DateTime<Utc>>,
}

impl ResumeState {
    /// Reads the resume point from the store
    ///
    /// A failed lookup is logged and treated as "nothing stored yet".
    pub fn load<S: ArticleStore>(store: &S, source_id: &str) -> Self {
        let latest_published = match store.latest_published(source_id) {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!("Could not load latest harvest date for {}: {}", source_id, e);
                None
            }
        };

        Self {
            source_id: source_id.to_string(),
            latest_published,
        }
    }
}

/// A single sitemap fetch target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapRequest {
    pub source_id: String,
    pub partition: NaiveDate,
    pub year: String,
    pub month: String,
    pub day: String,
    pub url: String,
}

/// Substitutes `{year}`, `{month}` and `{day}` in a sitemap url template
pub fn resolve_pattern(pattern: &str, date: NaiveDate) -> String {
    pattern
        .replace("{year}", &date.format("%Y").to_string())
        .replace("{month}", &date.format("%m").to_string())
        .replace("{day}", &date.format("%d").to_string())
}

/// Plans the sitemap targets for one source
#[derive(Debug, Clone)]
pub struct FrontierPlanner {
    source_id: String,
    patterns: Vec<String>,
    window: CrawlWindow,
    mode: CrawlMode,
    item_count_cap: u32,
}

impl FrontierPlanner {
    pub fn new(
        source_id: impl Into<String>,
        patterns: Vec<String>,
        window: CrawlWindow,
        mode: CrawlMode,
        item_count_cap: u32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            patterns,
            window,
            mode,
            item_count_cap,
        }
    }

    /// Builds a planner from configuration
    ///
    /// # Returns
    ///
    /// * `Err(HarvestError::UnsupportedCadence)` - raised before any partition is produced
    pub fn from_config(
        source: &SourceEntry,
        harvest: &HarvestConfig,
        mode: CrawlMode,
        today: NaiveDate,
    ) -> Result<Self, HarvestError> {
        let window = CrawlWindow::new(harvest.start_date, harvest.end_or(today), &source.cadence)?;
        Ok(Self::new(
            source.id.clone(),
            source.sitemap_patterns.clone(),
            window,
            mode,
            harvest.item_count_cap,
        ))
    }

    pub fn window(&self) -> &CrawlWindow {
        &self.window
    }

    /// Start of the partition range after applying the resume clamp
    ///
    /// Only `update` mode with at least one stored article narrows the window.
    pub fn effective_start(&self, resume: Option<&ResumeState>) -> NaiveDate {
        let latest = match (self.mode, resume) {
            (CrawlMode::Update, Some(state)) => state.latest_published,
            _ => None,
        };

        match latest {
            Some(latest) => {
                let start = self.window.start.max(latest.date_naive());
                tracing::info!("Already harvested up to {} for source {}", start, self.source_id);
                start
            }
            None => self.window.start,
        }
    }

    /// Plans the frontier, reading the resume point from `store` in update mode
    pub fn plan_from_store<S: ArticleStore>(&self, store: &S) -> SitemapFrontier {
        match self.mode {
            CrawlMode::Update => {
                let resume = ResumeState::load(store, &self.source_id);
                self.plan(Some(&resume))
            }
            CrawlMode::Full => self.plan(None),
        }
    }

    /// Produces the lazy sequence of sitemap targets, newest partition first
    pub fn plan(&self, resume: Option<&ResumeState>) -> SitemapFrontier {
        let origin = self.effective_start(resume);
        let cadence = self.window.cadence;

        // Highest step index whose partition still falls inside the window
        let mut last_step = None;
        let mut steps = 0u32;
        while let Some(date) = cadence.step(origin, steps) {
            if date > self.window.end {
                break;
            }
            last_step = Some(steps);
            steps += 1;
        }

        // Empty or inverted window: a single freshness check at the window end
        let fallback = if last_step.is_none() {
            Some(self.window.end)
        } else {
            None
        };

        let limit = if self.item_count_cap > 0 {
            Some(BOUNDED_RUN_SITEMAPS)
        } else {
            None
        };

        tracing::info!(
            source_id = %self.source_id,
            cadence = %cadence,
            "Planning sitemaps from {} to {} ({} partitions)",
            origin,
            self.window.end,
            last_step.map(|s| s + 1).unwrap_or(1)
        );

        SitemapFrontier {
            source_id: self.source_id.clone(),
            patterns: self.patterns.clone(),
            cadence,
            origin,
            next_step: last_step,
            fallback,
            current: None,
            pattern_index: 0,
            emitted: 0,
            limit,
        }
    }
}

/// Lazy, finite iterator over sitemap targets
///
/// Consumed once; a new run plans a new frontier.
#[derive(Debug)]
pub struct SitemapFrontier {
    source_id: String,
    patterns: Vec<String>,
    cadence: Cadence,
    origin: NaiveDate,
    next_step: Option<u32>,
    fallback: Option<NaiveDate>,
    current: Option<NaiveDate>,
    pattern_index: usize,
    emitted: usize,
    limit: Option<usize>,
}

impl SitemapFrontier {
    fn next_partition(&mut self) -> Option<NaiveDate> {
        if let Some(date) = self.fallback.take() {
            return Some(date);
        }
        let step = self.next_step?;
        self.next_step = step.checked_sub(1);
        self.cadence.step(self.origin, step)
    }
}

impl Iterator for SitemapFrontier {
    type Item = SitemapRequest;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return None;
            }
        }

        loop {
            if let Some(partition) = self.current {
                if let Some(pattern) = self.patterns.get(self.pattern_index) {
                    self.pattern_index += 1;
                    self.emitted += 1;

                    if self.limit == Some(self.emitted) {
                        tracing::info!("Sitemap limit hit for source {}", self.source_id);
                    }

                    return Some(SitemapRequest {
                        source_id: self.source_id.clone(),
                        partition,
                        year: partition.format("%Y").to_string(),
                        month: partition.format("%m").to_string(),
                        day: partition.format("%d").to_string(),
                        url: resolve_pattern(pattern, partition),
                    });
                }
            }

            self.current = Some(self.next_partition()?);
            self.pattern_index = 0;
        }
    }
}
