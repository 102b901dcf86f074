//! HTTP fetcher and sitemap reader
//!
//! This module handles the HTTP side of a harvest:
//! - Building the HTTP client with the crawler's user agent string
//! - GET requests for sitemaps and article pages
//! - Gunzipping `.xml.gz` sitemaps
//! - Reading `<loc>` entries out of sitemaps and sitemap indexes

use crate::config::UserAgentConfig;
use crate::HarvestError;
use flate2::read::GzDecoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{redirect::Policy, Client};
use std::io::Read;
use std::time::Duration;
use tracing::warn;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Leading bytes of a gzip stream
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Entries read from a sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// A `<urlset>` listing article pages
    Urlset(Vec<String>),
    /// A `<sitemapindex>` listing further sitemaps
    Index(Vec<String>),
}

impl SitemapDocument {
    pub fn len(&self) -> usize {
        match self {
            Self::Urlset(urls) | Self::Index(urls) => urls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Formats the user agent: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use news_harvest::config::UserAgentConfig;
/// use news_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "NewsHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches `url` and returns the response body
///
/// # Returns
///
/// * `Ok(String)` - Body of a 2xx response
/// * `Err(HarvestError::Http)` - Non-success status code
/// * `Err(HarvestError::Reqwest)` - Network, timeout or decoding failure
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, HarvestError> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(HarvestError::Http {
            url: url.to_string(),
            message: format!("status {}", status.as_u16()),
        });
    }

    Ok(response.text().await?)
}

/// Fetches `url` and returns the raw response body
///
/// Used for sitemaps, which may be served as gzip files without a
/// `Content-Encoding` header.
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, HarvestError> {
    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(HarvestError::Http {
            url: url.to_string(),
            message: format!("status {}", status.as_u16()),
        });
    }

    Ok(response.bytes().await?.to_vec())
}

/// Turns a fetched sitemap body into text, gunzipping it first when it
/// starts with the gzip magic bytes
pub fn decode_sitemap_body(body: &[u8]) -> Result<String, HarvestError> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }

    let mut xml = String::new();
    GzDecoder::new(body).read_to_string(&mut xml)?;
    Ok(xml)
}

/// Reads the `<loc>` entries of a sitemap or sitemap index
///
/// The root element decides the kind: `<sitemapindex>` yields an index,
/// anything else a urlset. Entries are trimmed and blank ones are dropped.
/// Malformed XML stops the read and keeps the entries seen so far.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let mut reader = Reader::from_str(xml);

    let mut is_index = None;
    let mut current: Option<String> = None;
    let mut locs = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = element.local_name();
                if is_index.is_none() {
                    is_index = Some(name.as_ref() == b"sitemapindex");
                }
                if name.as_ref() == b"loc" {
                    current = Some(String::new());
                }
            }
            Ok(Event::Empty(element)) => {
                if is_index.is_none() {
                    is_index = Some(element.local_name().as_ref() == b"sitemapindex");
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                if let Some(loc) = current.as_mut() {
                    push_reference(loc, &String::from_utf8_lossy(&reference));
                }
            }
            Ok(Event::End(element)) => {
                if element.local_name().as_ref() == b"loc" {
                    if let Some(loc) = current.take() {
                        let loc = loc.trim();
                        if !loc.is_empty() {
                            locs.push(loc.to_string());
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(
                    position = reader.error_position(),
                    error = %e,
                    "Malformed sitemap XML"
                );
                break;
            }
        }
    }

    if is_index == Some(true) {
        SitemapDocument::Index(locs)
    } else {
        SitemapDocument::Urlset(locs)
    }
}

/// Appends the text of an `&name;` reference; unknown names are kept verbatim
fn push_reference(loc: &mut String, name: &str) {
    if let Some(code) = name.strip_prefix('#') {
        let decoded = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        }
        .and_then(char::from_u32);
        if let Some(c) = decoded {
            loc.push(c);
            return;
        }
    } else if let Some(text) = resolve_predefined_entity(name) {
        loc.push_str(text);
        return;
    }

    loc.push('&');
    loc.push_str(name);
    loc.push(';');
}
