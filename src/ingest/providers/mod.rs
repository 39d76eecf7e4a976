// src/ingest/providers/mod.rs
pub mod rss;
pub mod web_search;

pub use rss::RssProvider;
pub use web_search::{InterestDiscovery, WebSearchDiscovery};
