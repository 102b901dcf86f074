//! Generic extractor driven by Open Graph and article meta tags

use crate::extract::{collapse_whitespace, element_text, meta_content, Extractor, Page};
use crate::storage::{parse_timestamp, ArticleRecord};
use crate::HarvestError;
use chrono::Utc;
use scraper::{Html, Selector};

/// Works on any page that carries standard news meta tags
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaTagExtractor;

impl Extractor for MetaTagExtractor {
    fn name(&self) -> &str {
        "meta-tags"
    }

    fn extract(&self, page: &Page) -> Result<ArticleRecord, HarvestError> {
        let document = Html::parse_document(&page.html);

        let title = meta_content(&document, &["meta[property='og:title']"])
            .or_else(|| element_text(&document, "title"))
            .or_else(|| element_text(&document, "h1"));
        let article_text = body_text(&document);

        if title.is_none() && article_text.is_none() {
            return Err(HarvestError::Extract {
                url: page.url.clone(),
                message: "page has neither a title nor body text".to_string(),
            });
        }

        Ok(ArticleRecord {
            url: Some(page.url.clone()),
            title,
            description: meta_content(
                &document,
                &["meta[property='og:description']", "meta[name='description']"],
            ),
            author: meta_content(
                &document,
                &["meta[name='author']", "meta[property='article:author']"],
            ),
            article_text,
            date_published: meta_content(
                &document,
                &[
                    "meta[property='article:published_time']",
                    "meta[itemprop='datePublished']",
                ],
            )
            .and_then(|raw| parse_timestamp(&raw)),
            date_modified: meta_content(
                &document,
                &[
                    "meta[property='article:modified_time']",
                    "meta[itemprop='dateModified']",
                ],
            )
            .and_then(|raw| parse_timestamp(&raw)),
            fetched_at: Some(page.fetched_at),
            parsed_at: Some(Utc::now()),
            paywall: paywall(&document),
        })
    }
}

/// Paragraphs inside `<article>`, or every paragraph when there is no article element
fn body_text(document: &Html) -> Option<String> {
    ["article p", "p"].iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|p| !p.is_empty())
            .collect();
        if paragraphs.is_empty() {
            None
        } else {
            Some(paragraphs.join("\n\n"))
        }
    })
}

fn paywall(document: &Html) -> Option<bool> {
    if let Some(tier) = meta_content(
        document,
        &["meta[property='article:content_tier']", "meta[name='content_tier']"],
    ) {
        return Some(!tier.eq_ignore_ascii_case("free"));
    }
    meta_content(document, &["meta[itemprop='isAccessibleForFree']"])
        .map(|free| free.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const ARTICLE: &str = r#"
        <html>
          <head>
            <title>Fallback title</title>
            <meta property="og:title" content="  Rates held steady  ">
            <meta name="description" content="The central bank paused.">
            <meta name="author" content="J. Doe">
            <meta property="article:published_time" content="2024-02-10T08:30:00+01:00">
            <meta property="article:modified_time" content="2024-02-11">
            <meta property="article:content_tier" content="metered">
          </head>
          <body>
            <p>Navigation</p>
            <article>
              <p>First   paragraph.</p>
              <p></p>
              <p>Second paragraph.</p>
            </article>
          </body>
        </html>
    "#;

    #[test]
    fn test_extracts_meta_tags() {
        let page = Page::new("https://news.test/a/1", ARTICLE);
        let record = MetaTagExtractor.extract(&page).unwrap();

        assert_eq!(record.url.as_deref(), Some("https://news.test/a/1"));
        assert_eq!(record.title.as_deref(), Some("Rates held steady"));
        assert_eq!(record.description.as_deref(), Some("The central bank paused."));
        assert_eq!(record.author.as_deref(), Some("J. Doe"));
        assert_eq!(
            record.date_published,
            Some(Utc.with_ymd_and_hms(2024, 2, 10, 7, 30, 0).unwrap())
        );
        assert_eq!(
            record.date_modified,
            Some(Utc.with_ymd_and_hms(2024, 2, 11, 0, 0, 0).unwrap())
        );
        assert_eq!(
            record.article_text.as_deref(),
            Some("First paragraph.\n\nSecond paragraph.")
        );
        assert_eq!(record.paywall, Some(true));
        assert_eq!(record.fetched_at, Some(page.fetched_at));
    }

    #[test]
    fn test_falls_back_to_title_and_loose_paragraphs() {
        let html = "<html><head><title>Plain</title></head><body><p>Only text</p></body></html>";
        let record = MetaTagExtractor
            .extract(&Page::new("https://news.test/a/2", html))
            .unwrap();

        assert_eq!(record.title.as_deref(), Some("Plain"));
        assert_eq!(record.article_text.as_deref(), Some("Only text"));
        assert_eq!(record.date_published, None);
        assert_eq!(record.paywall, None);
    }

    #[test]
    fn test_empty_page_is_an_error() {
        let result = MetaTagExtractor.extract(&Page::new("https://news.test/a/3", "<html></html>"));
        assert!(matches!(result, Err(HarvestError::Extract { .. })));
    }
}
