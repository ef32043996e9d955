//! RSS Timeline - merged, recency-sorted view over registered RSS/Atom feeds.
//!
//! Feeds are fetched and parsed on every read. A source that cannot be fetched
//! or parsed contributes no entries instead of failing the whole timeline.

pub mod aggregator;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod routes;
