//! Per-source article extraction
//!
//! Extractors turn a fetched article page into an [`ArticleRecord`]. Each
//! configured source names the extractor it uses by registry key; site
//! specific parsers register themselves next to the generic meta-tag one.

mod meta;

pub use meta::MetaTagExtractor;

use crate::storage::ArticleRecord;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use std::collections::HashMap;

/// A fetched article page
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

impl Page {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Turns a page into an article record
pub trait Extractor: Send + Sync {
    /// Registry key, also used in logs
    fn name(&self) -> &str;

    /// Extracts the record; the record url is always the page url
    fn extract(&self, page: &Page) -> Result<ArticleRecord, HarvestError>;
}

/// Extractors by registry key
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the generic meta-tag extractor under `meta-tags`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(MetaTagExtractor);
        registry
    }

    /// Registers an extractor under its name, replacing any previous one
    pub fn register<E: Extractor + 'static>(&mut self, extractor: E) {
        self.extractors
            .insert(extractor.name().to_string(), Box::new(extractor));
    }

    pub fn get(&self, key: &str) -> Result<&dyn Extractor, HarvestError> {
        self.extractors
            .get(key)
            .map(|e| e.as_ref())
            .ok_or_else(|| HarvestError::UnknownExtractor(key.to_string()))
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.keys())
            .finish()
    }
}

/// First `content` attribute among `selectors`, trimmed and non-empty
pub(crate) fn meta_content(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Text of the first element matching `selector`, whitespace-collapsed
pub(crate) fn element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|s| !s.is_empty())
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
