use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::normalizer::{NormalizedEntry, Normalizer, SourceOutcome, SourceStatus};

/// Merged view across several feeds.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub entries: Vec<NormalizedEntry>,
    pub sources: Vec<SourceStatus>,
}

pub struct Aggregator {
    normalizer: Normalizer,
    max_concurrent: usize,
}

impl Aggregator {
    pub fn new(normalizer: Normalizer, max_concurrent: usize) -> Self {
        Self {
            normalizer,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Fetcher::from_config(config)?;
        Ok(Self::new(
            Normalizer::new(fetcher),
            config.max_concurrent_fetches,
        ))
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Entries of a single feed in the feed's own order.
    pub async fn aggregate_one(&self, url: &str) -> Vec<NormalizedEntry> {
        self.normalizer.normalize(url).await
    }

    /// Entries of every feed, most recently published first.
    pub async fn aggregate_all<S: AsRef<str>>(&self, urls: &[S]) -> Vec<NormalizedEntry> {
        self.timeline(urls).await.entries
    }

    pub async fn timeline<S: AsRef<str>>(&self, urls: &[S]) -> Timeline {
        info!("Aggregating {} feeds", urls.len());

        let owned: Vec<String> = urls.iter().map(|u| u.as_ref().to_string()).collect();

        // `buffered` yields in input order, so concatenation order is stable.
        let outcomes: Vec<SourceOutcome> = stream::iter(owned)
            .map(|url| async move { self.normalizer.normalize_source(&url).await })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let sources = outcomes.iter().map(SourceOutcome::status).collect();
        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        let entries = merge_by_published(outcomes.into_iter().map(|o| o.entries));

        info!(
            "Aggregated {} entries from {} feeds ({} failed)",
            entries.len(),
            urls.len(),
            failed
        );

        Timeline { entries, sources }
    }
}

/// Concatenate per-source batches and sort newest first.
///
/// Entries with equal publish times keep their concatenation order.
pub fn merge_by_published<I>(batches: I) -> Vec<NormalizedEntry>
where
    I: IntoIterator<Item = Vec<NormalizedEntry>>,
{
    let mut merged: Vec<NormalizedEntry> = batches.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.published.cmp(&a.published));
    merged
}
