use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Per-request timeout in seconds for feed fetches
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Upper bound on feeds fetched at the same time during an aggregate read
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Hand non-2xx response bodies to the parser instead of failing the fetch
    #[serde(default)]
    pub accept_error_status: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Feeds registered at startup
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_user_agent() -> String {
    concat!("rss-timeline/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub title: String,
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            accept_error_status: false,
            user_agent: default_user_agent(),
            bind_address: default_bind_address(),
            feeds: Vec::new(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be at least 1");
        }
        if config.fetch_timeout_secs == 0 {
            anyhow::bail!("fetch_timeout_secs must be at least 1");
        }
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults with no feeds.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
