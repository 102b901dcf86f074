//! Rate-limit retry and call spacing for summary providers

use crate::config::SummarizerConfig;
use crate::storage::StoredArticle;
use crate::summarize::{summarize_articles, SummarizeError, SummaryProvider, MAX_DIGEST_ARTICLES};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Retry schedule for rate-limited calls
///
/// The wait after the n-th rate-limited attempt is `backoff_step * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    /// Minimum time between the starts of two provider calls
    pub min_spacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(12),
            min_spacing: Duration::from_millis(6500),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    /// Every wait a fully rate-limited call goes through
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

/// Wraps a provider with rate-limit retries and minimum call spacing
pub struct RetryingSummarizer<P> {
    inner: P,
    policy: RetryPolicy,
    max_articles: usize,
    last_call: Mutex<Option<Instant>>,
}

impl<P: SummaryProvider> RetryingSummarizer<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            max_articles: MAX_DIGEST_ARTICLES,
            last_call: Mutex::new(None),
        }
    }

    /// Wraps `inner` with the pacing and digest size of a `[summarizer]` table
    pub fn from_config(inner: P, config: &SummarizerConfig) -> Self {
        Self {
            max_articles: config.max_articles,
            ..Self::new(inner, config.retry_policy())
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn max_articles(&self) -> usize {
        self.max_articles
    }

    /// Summarizes the newest of `articles` into one digest
    ///
    /// At most `max_articles` articles (never more than 15) go into the prompt.
    pub async fn digest(&self, articles: &[StoredArticle], topic: &str) -> Result<String, SummarizeError> {
        summarize_articles(self, articles, topic, self.max_articles).await
    }

    /// Calls the provider once, waiting out the spacing since the previous call
    async fn paced_call(&self, prompt: &str) -> Result<String, SummarizeError> {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.min_spacing {
                sleep(self.policy.min_spacing - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
        self.inner.summarize(prompt).await
    }
}

impl<P> fmt::Debug for RetryingSummarizer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingSummarizer")
            .field("policy", &self.policy)
            .field("max_articles", &self.max_articles)
            .finish()
    }
}

impl<P: SummaryProvider> SummaryProvider for RetryingSummarizer<P> {
    async fn summarize(&self, prompt: &str) -> Result<String, SummarizeError> {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.paced_call(prompt).await {
                Err(SummarizeError::RateLimited) => {
                    if attempt >= self.policy.max_attempts {
                        tracing::error!(
                            attempt,
                            max = self.policy.max_attempts,
                            elapsed_ms_total = started.elapsed().as_millis() as u64,
                            "summarize() exhausted retries"
                        );
                        return Err(SummarizeError::RetriesExhausted { attempts: attempt });
                    }

                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        ?delay,
                        "Rate limit hit; backing off"
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
