//! Turns a feed URL into a list of [`NormalizedEntry`] values.
//!
//! Fetch and parse failures never escape this module: they are logged and the
//! source contributes an empty list. [`Normalizer::normalize_source`] keeps the
//! failure alongside the (empty) entries for callers that want to report it.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Link};
use feed_rs::parser::{self, ParseFeedError};
use serde::Serialize;
use tracing::{error, info};

use crate::error::SourceError;
use crate::fetcher::Fetcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEntry {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub published: DateTime<Utc>,
}

/// Result of normalizing one source, successful or not.
#[derive(Debug)]
pub struct SourceOutcome {
    pub url: String,
    pub entries: Vec<NormalizedEntry>,
    pub error: Option<SourceError>,
}

/// Per-source summary attached to aggregate reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub url: String,
    pub entries: usize,
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            url: self.url.clone(),
            entries: self.entries.len(),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

pub struct Normalizer {
    fetcher: Fetcher,
}

impl Normalizer {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Entries for `url`, or an empty list if the feed could not be fetched or parsed.
    pub async fn normalize(&self, url: &str) -> Vec<NormalizedEntry> {
        self.normalize_source(url).await.entries
    }

    pub async fn normalize_source(&self, url: &str) -> SourceOutcome {
        match self.try_normalize(url).await {
            Ok(entries) => {
                info!("Normalized {} entries from {}", entries.len(), url);
                SourceOutcome {
                    url: url.to_string(),
                    entries,
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to fetch feed from {}: {}", url, e);
                SourceOutcome {
                    url: url.to_string(),
                    entries: Vec::new(),
                    error: Some(e),
                }
            }
        }
    }

    async fn try_normalize(&self, url: &str) -> Result<Vec<NormalizedEntry>, SourceError> {
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| SourceError::Fetch {
                url: url.to_string(),
                source,
            })?;

        parse_entries(&bytes, Utc::now()).map_err(|source| SourceError::Parse {
            url: url.to_string(),
            source,
        })
    }
}

/// Parse a syndication document and normalize its entries in document order.
///
/// `now` stands in for the publish time of entries that carry none.
pub fn parse_entries(
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<Vec<NormalizedEntry>, ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(feed
        .entries
        .into_iter()
        .map(|entry| normalize_entry(entry, now))
        .collect())
}

pub fn normalize_entry(entry: Entry, now: DateTime<Utc>) -> NormalizedEntry {
    let url = entry_link(&entry.links).map(|l| l.href.clone());

    NormalizedEntry {
        title: entry.title.map(|t| t.content),
        url,
        summary: entry.summary.map(|s| s.content),
        // Atom entries without <published> report <updated> as their publish time
        published: entry.published.or(entry.updated).unwrap_or(now),
    }
}

/// The entry's alternate link, falling back to whatever link comes first.
fn entry_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| match l.rel.as_deref() {
            None => true,
            Some(rel) => rel.eq_ignore_ascii_case("alternate"),
        })
        .or_else(|| links.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0">
            <channel>
                <title>Tech News</title>
                <link>https://technews.example.com</link>
                <description>Latest tech news</description>
                <item>
                    <title>Breaking: New Technology Announced</title>
                    <link>https://technews.example.com/article/1</link>
                    <description>Something new</description>
                    <pubDate>Mon, 09 Dec 2024 12:00:00 GMT</pubDate>
                </item>
                <item>
                    <title>Undated Post</title>
                    <link>https://technews.example.com/article/2</link>
                </item>
            </channel>
        </rss>
    "#;

    const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <title>Atom Blog</title>
            <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
            <updated>2024-12-09T08:00:00Z</updated>
            <entry>
                <title>Atom Entry</title>
                <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
                <link rel="replies" href="https://blog.example.com/post/1/comments"/>
                <link rel="alternate" href="https://blog.example.com/post/1"/>
                <updated>2024-12-09T08:00:00Z</updated>
                <summary>Short summary</summary>
            </entry>
        </feed>
    "#;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn create_link(href: &str, rel: Option<&str>) -> Link {
        Link {
            href: href.to_string(),
            rel: rel.map(|r| r.to_string()),
            media_type: None,
            href_lang: None,
            title: None,
            length: None,
        }
    }

    fn test_normalizer() -> Normalizer {
        Normalizer::new(Fetcher::new(Duration::from_secs(5), "rss-timeline-test").unwrap())
    }

    mod parse_entries_tests {
        use super::*;

        #[test]
        fn test_rss_entries_in_document_order() {
            let entries = parse_entries(RSS_FEED.as_bytes(), fixed_now()).unwrap();

            assert_eq!(entries.len(), 2);
            assert_eq!(
                entries[0].title.as_deref(),
                Some("Breaking: New Technology Announced")
            );
            assert_eq!(
                entries[0].url.as_deref(),
                Some("https://technews.example.com/article/1")
            );
            assert_eq!(entries[0].summary.as_deref(), Some("Something new"));
            assert_eq!(
                entries[0].published,
                Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap()
            );
            assert_eq!(entries[1].title.as_deref(), Some("Undated Post"));
        }

        #[test]
        fn test_missing_published_uses_now() {
            let entries = parse_entries(RSS_FEED.as_bytes(), fixed_now()).unwrap();
            assert_eq!(entries[1].published, fixed_now());
            assert!(entries[1].summary.is_none());
        }

        #[test]
        fn test_atom_entry_uses_updated_and_alternate_link() {
            let entries = parse_entries(ATOM_FEED.as_bytes(), fixed_now()).unwrap();

            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].title.as_deref(), Some("Atom Entry"));
            assert_eq!(
                entries[0].url.as_deref(),
                Some("https://blog.example.com/post/1")
            );
            assert_eq!(entries[0].summary.as_deref(), Some("Short summary"));
            assert_eq!(
                entries[0].published,
                Utc.with_ymd_and_hms(2024, 12, 9, 8, 0, 0).unwrap()
            );
        }

        #[test]
        fn test_feed_without_entries() {
            let xml = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
            let entries = parse_entries(xml.as_bytes(), fixed_now()).unwrap();
            assert!(entries.is_empty());
        }

        #[test]
        fn test_html_is_parse_error() {
            let html = "<html><body><h1>Not Found</h1></body></html>";
            assert!(parse_entries(html.as_bytes(), fixed_now()).is_err());
        }

        #[test]
        fn test_garbage_is_parse_error() {
            assert!(parse_entries(b"plain text, not a feed", fixed_now()).is_err());
            assert!(parse_entries(b"", fixed_now()).is_err());
        }
    }

    mod normalize_entry_tests {
        use super::*;

        #[test]
        fn test_absent_fields_stay_absent() {
            let entry = Entry::default();
            let normalized = normalize_entry(entry, fixed_now());

            assert_eq!(
                normalized,
                NormalizedEntry {
                    title: None,
                    url: None,
                    summary: None,
                    published: fixed_now(),
                }
            );
        }

        #[test]
        fn test_published_preferred_over_updated() {
            let published = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
            let updated = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();
            let entry = Entry {
                published: Some(published),
                updated: Some(updated),
                ..Default::default()
            };

            assert_eq!(normalize_entry(entry, fixed_now()).published, published);
        }

        #[test]
        fn test_first_link_when_no_alternate() {
            let entry = Entry {
                links: vec![
                    create_link("https://example.com/comments", Some("replies")),
                    create_link("https://example.com/enclosure", Some("enclosure")),
                ],
                ..Default::default()
            };

            assert_eq!(
                normalize_entry(entry, fixed_now()).url.as_deref(),
                Some("https://example.com/comments")
            );
        }

        #[test]
        fn test_link_without_rel_is_alternate() {
            let entry = Entry {
                links: vec![
                    create_link("https://example.com/comments", Some("replies")),
                    create_link("https://example.com/post", None),
                ],
                ..Default::default()
            };

            assert_eq!(
                normalize_entry(entry, fixed_now()).url.as_deref(),
                Some("https://example.com/post")
            );
        }

        #[test]
        fn test_case_insensitive_alternate_rel() {
            let entry = Entry {
                links: vec![
                    create_link("https://example.com/self", Some("self")),
                    create_link("https://example.com/post", Some("ALTERNATE")),
                ],
                ..Default::default()
            };

            assert_eq!(
                normalize_entry(entry, fixed_now()).url.as_deref(),
                Some("https://example.com/post")
            );
        }
    }

    mod normalizer_tests {
        use super::*;

        #[tokio::test]
        async fn test_normalize_fetched_feed() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/rss"))
                .respond_with(ResponseTemplate::new(200).set_body_string(RSS_FEED))
                .mount(&server)
                .await;

            let before = Utc::now();
            let entries = test_normalizer()
                .normalize(&format!("{}/rss", server.uri()))
                .await;
            let after = Utc::now();

            assert_eq!(entries.len(), 2);
            assert!(entries[1].published >= before && entries[1].published <= after);
        }

        #[tokio::test]
        async fn test_fetch_failure_yields_empty() {
            let outcome = test_normalizer()
                .normalize_source("http://127.0.0.1:1/feed.xml")
                .await;

            assert!(outcome.entries.is_empty());
            assert!(matches!(outcome.error, Some(SourceError::Fetch { .. })));
            assert_eq!(outcome.status().entries, 0);
            assert!(outcome.status().error.unwrap().contains("127.0.0.1:1"));
        }

        #[tokio::test]
        async fn test_parse_failure_yields_empty() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string("definitely not xml"))
                .mount(&server)
                .await;

            let outcome = test_normalizer().normalize_source(&server.uri()).await;

            assert!(outcome.is_failure());
            assert!(outcome.entries.is_empty());
            assert!(matches!(outcome.error, Some(SourceError::Parse { .. })));
            assert_eq!(outcome.error.unwrap().url(), server.uri());
        }

        #[tokio::test]
        async fn test_error_status_yields_empty() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503).set_body_string(RSS_FEED))
                .mount(&server)
                .await;

            let entries = test_normalizer().normalize(&server.uri()).await;
            assert!(entries.is_empty());
        }

        #[tokio::test]
        async fn test_accepted_error_status_body_is_parsed() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503).set_body_string(RSS_FEED))
                .mount(&server)
                .await;

            let fetcher = Fetcher::new(Duration::from_secs(5), "rss-timeline-test")
                .unwrap()
                .accept_error_status(true);
            let entries = Normalizer::new(fetcher).normalize(&server.uri()).await;

            assert_eq!(entries.len(), 2);
        }

        #[tokio::test]
        async fn test_successful_outcome_status() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FEED))
                .mount(&server)
                .await;

            let outcome = test_normalizer().normalize_source(&server.uri()).await;

            assert!(!outcome.is_failure());
            assert_eq!(
                outcome.status(),
                SourceStatus {
                    url: server.uri(),
                    entries: 1,
                    error: None,
                }
            );
        }
    }
}
