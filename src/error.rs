use std::time::Duration;

use feed_rs::parser::ParseFeedError;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure to retrieve the raw content of a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server responded with HTTP {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(reqwest::Error),
}

/// Why a single feed source contributed no entries.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseFeedError,
    },
}

impl SourceError {
    pub fn url(&self) -> &str {
        match self {
            SourceError::Fetch { url, .. } | SourceError::Parse { url, .. } => url,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("title can't be blank")]
    BlankTitle,
    #[error("url can't be blank")]
    BlankUrl,
    #[error("url has already been taken: {0}")]
    DuplicateUrl(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
