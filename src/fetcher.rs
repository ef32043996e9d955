use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;

/// Retrieves the raw body of a feed URL.
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    accept_error_status: bool,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            timeout,
            accept_error_status: false,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(config.fetch_timeout(), &config.user_agent)?
            .accept_error_status(config.accept_error_status))
    }

    /// When set, non-2xx bodies are returned as content and left for the parser to reject.
    pub fn accept_error_status(mut self, accept: bool) -> Self {
        self.accept_error_status = accept;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching feed: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() && !self.accept_error_status {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(bytes.to_vec())
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err)
        }
    }
}
