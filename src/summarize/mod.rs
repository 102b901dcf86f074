//! Summarization collaborator
//!
//! Harvested articles can be condensed into a short digest by an external
//! text-generation service. The service is abstracted behind
//! [`SummaryProvider`]; [`RetryingSummarizer`] wraps any provider with the
//! rate-limit retry and call spacing the free service tiers require.

mod retry;

pub use retry::{RetryPolicy, RetryingSummarizer};

use crate::storage::StoredArticle;
use thiserror::Error;

/// Hard ceiling on articles folded into one digest prompt
pub const MAX_DIGEST_ARTICLES: usize = 15;

/// Characters of body text appended per article
const DIGEST_TEXT_CHARS: usize = 500;

/// Body text at or below this length is considered too thin to include
const MIN_DIGEST_TEXT_CHARS: usize = 100;

/// Errors from a summarization call
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// The service refused the call for quota reasons; retry after a backoff
    #[error("Rate limited by summarization service")]
    RateLimited,

    #[error("Summarization service error: {0}")]
    Provider(String),

    #[error("Rate limit persisted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("No articles to summarize")]
    EmptyInput,
}

/// A text-generation service turning a prompt into a summary
#[allow(async_fn_in_trait)]
pub trait SummaryProvider {
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizeError>;
}

/// Builds the digest prompt for a topic over the newest articles
///
/// At most `min(max_articles, 15)` articles are listed, each as
/// `N. [source] title. description` followed by the first 500 characters of
/// the body when the body is longer than 100 characters.
pub fn build_digest_prompt(articles: &[StoredArticle], topic: &str, max_articles: usize) -> String {
    let selected = &articles[..articles.len().min(max_articles.min(MAX_DIGEST_ARTICLES))];

    let entries: Vec<String> = selected
        .iter()
        .enumerate()
        .map(|(i, article)| {
            let mut content = format!(
                "{}. {}",
                article.title.as_deref().unwrap_or("Untitled"),
                article.description.as_deref().unwrap_or("")
            );
            if let Some(text) = article.article_text.as_deref() {
                if text.chars().count() > MIN_DIGEST_TEXT_CHARS {
                    content.push(' ');
                    content.extend(text.chars().take(DIGEST_TEXT_CHARS));
                }
            }
            format!("{}. [{}] {}", i + 1, article.source_id, content)
        })
        .collect();

    let topic_context = if topic.trim().is_empty() {
        String::new()
    } else {
        format!(" about '{}'", topic.trim())
    };

    format!(
        "You are analyzing {} news articles{}.\n\n\
         Articles:\n{}\n\n\
         Create a comprehensive bullet-point summary (5-8 points) that:\n\
         - Identifies the main themes and key facts across all articles\n\
         - Highlights important trends, figures, or events\n\
         - Notes any different perspectives\n\n\
         Format as clear, concise bullet points:",
        selected.len(),
        topic_context,
        entries.join("\n\n")
    )
}

/// Summarizes the given articles in a single provider call
pub async fn summarize_articles<P: SummaryProvider>(
    provider: &P,
    articles: &[StoredArticle],
    topic: &str,
    max_articles: usize,
) -> Result<String, SummarizeError> {
    if articles.is_empty() || max_articles == 0 {
        return Err(SummarizeError::EmptyInput);
    }

    let prompt = build_digest_prompt(articles, topic, max_articles);
    tracing::debug!("Digest prompt is {} characters", prompt.len());
    provider.summarize(&prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(i: usize, text: Option<&str>) -> StoredArticle {
        StoredArticle {
            id: i as i64,
            url: format!("https://news.test/a/{}", i),
            title: Some(format!("Title {}", i)),
            description: Some(format!("Desc {}", i)),
            author: None,
            article_text: text.map(str::to_string),
            date_published: None,
            date_modified: None,
            fetched_at: None,
            parsed_at: None,
            paywall: None,
            source_id: "wire".to_string(),
            stored_at: Utc::now(),
        }
    }

    #[test]
    fn test_digest_caps_article_count() {
        let articles: Vec<StoredArticle> = (1..=20).map(|i| article(i, None)).collect();

        let prompt = build_digest_prompt(&articles, "", 20);

        assert!(prompt.starts_with("You are analyzing 15 news articles."));
        assert!(prompt.contains("15. [wire] Title 15. Desc 15"));
        assert!(!prompt.contains("Title 16"));
    }

    #[test]
    fn test_digest_text_excerpt() {
        let long = "x".repeat(600);
        let articles = vec![article(1, Some("short body")), article(2, Some(&long))];

        let prompt = build_digest_prompt(&articles, " rates ", 15);

        assert!(prompt.contains("about 'rates'"));
        assert!(prompt.contains("1. [wire] Title 1. Desc 1\n"));
        assert!(prompt.contains(&format!("2. [wire] Title 2. Desc 2 {}\n", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
    }

    #[tokio::test]
    async fn test_empty_input() {
        struct Unused;
        impl SummaryProvider for Unused {
            async fn summarize(&self, _: &str) -> Result<String, SummarizeError> {
                Ok(String::new())
            }
        }

        let result = summarize_articles(&Unused, &[], "", 15).await;
        assert!(matches!(result, Err(SummarizeError::EmptyInput)));
    }
}
