// src/ingest/providers/rss.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::config::FeedConfig;
use crate::dedup::{normalize_url, short_digest};
use crate::ingest::clean_text;
use crate::ingest::types::SourceProvider;
use crate::model::RawSourceItem;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const TITLE_CHARS: usize = 300;
const DESCRIPTION_CHARS: usize = 1500;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let unix = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?.unix_timestamp();
    DateTime::from_timestamp(unix, 0)
}

/// RSS 2.0 feed, fetched over HTTP or read from fixture text.
pub struct RssProvider {
    feed: FeedConfig,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http(reqwest::Client),
}

impl RssProvider {
    pub fn from_feed(feed: FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building rss http client")?;
        Ok(Self {
            feed,
            mode: Mode::Http(client),
        })
    }

    pub fn from_fixture_str(feed: FeedConfig, xml: &str) -> Self {
        Self {
            feed,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    /// Items without a title or link are dropped.
    pub fn parse_items(&self, xml: &str, now: DateTime<Utc>) -> Result<Vec<RawSourceItem>> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing rss xml from {}", self.feed.name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = clean_text(it.title.as_deref().unwrap_or_default(), TITLE_CHARS);
            let url = it.link.as_deref().unwrap_or_default().trim().to_string();
            if title.is_empty() || url.is_empty() {
                continue;
            }
            let description =
                clean_text(it.description.as_deref().unwrap_or_default(), DESCRIPTION_CHARS);
            out.push(RawSourceItem {
                id: short_digest(&normalize_url(&url)),
                title,
                raw_content: description.clone(),
                description,
                url,
                source_name: self.feed.name.clone(),
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822).unwrap_or(now),
                fetched_at: now,
                category: self.feed.category,
                sub_category: self.feed.sub_category,
                processed: false,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch(&self) -> Result<Vec<RawSourceItem>> {
        let now = Utc::now();
        match &self.mode {
            Mode::Fixture(s) => self.parse_items(s, now),
            Mode::Http(client) => {
                let resp = client
                    .get(&self.feed.url)
                    .send()
                    .await
                    .with_context(|| format!("rss get {}", self.feed.url))?
                    .error_for_status()
                    .with_context(|| format!("rss status {}", self.feed.url))?;
                let body = resp.text().await.context("rss http .text()")?;
                self.parse_items(&body, now)
            }
        }
    }

    fn name(&self) -> &str {
        &self.feed.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&aelig;", "æ")
        .replace("&oslash;", "ø")
        .replace("&aring;", "å")
        .replace("&AElig;", "Æ")
        .replace("&Oslash;", "Ø")
        .replace("&Aring;", "Å")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, SubCategory};

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>DR</title>
  <item>
    <title>Regeringen &oslash;nsker ny &lt;b&gt;aftale&lt;/b&gt;</title>
    <link>https://www.dr.dk/nyheder/a</link>
    <pubDate>Wed, 01 Oct 2025 07:30:00 +0200</pubDate>
    <description><![CDATA[<p>Forhandlinger   fortsætter&nbsp;i dag.</p>]]></description>
  </item>
  <item>
    <title></title>
    <link>https://www.dr.dk/nyheder/b</link>
  </item>
  <item>
    <title>Uden link</title>
  </item>
</channel></rss>"#;

    fn feed() -> FeedConfig {
        FeedConfig {
            name: "DR Nyheder".into(),
            url: "https://www.dr.dk/nyheder/service/feeds/senestenyt".into(),
            category: Category::Domestic,
            sub_category: SubCategory::General,
        }
    }

    #[tokio::test]
    async fn fixture_items_are_cleaned_and_incomplete_dropped() {
        let p = RssProvider::from_fixture_str(feed(), FIXTURE);
        let items = p.fetch().await.unwrap();
        assert_eq!(items.len(), 1);
        let it = &items[0];
        assert_eq!(it.title, "Regeringen ønsker ny aftale");
        assert_eq!(it.description, "Forhandlinger fortsætter i dag.");
        assert_eq!(it.source_name, "DR Nyheder");
        assert_eq!(it.category, Category::Domestic);
        assert_eq!(it.published_at.to_rfc3339(), "2025-10-01T05:30:00+00:00");
        assert_eq!(it.id, short_digest("https://www.dr.dk/nyheder/a"));
        assert_eq!(p.name(), "DR Nyheder");
    }

    #[test]
    fn empty_channel_parses() {
        let p = RssProvider::from_fixture_str(feed(), "");
        let items = p
            .parse_items("<rss><channel><title>x</title></channel></rss>", Utc::now())
            .unwrap();
        assert!(items.is_empty());
        assert!(p.parse_items("not xml at all", Utc::now()).is_err());
    }
}
