// src/ingest/providers/web_search.rs
//! News discovery through the web-search completion collaborator.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::categorize::Categorizer;
use crate::config::DiscoveryQuery;
use crate::dedup::{normalize_url, short_digest};
use crate::ingest::clean_text;
use crate::ingest::types::SourceProvider;
use crate::interest::InterestRegistry;
use crate::llm::coerce::text_or;
use crate::llm::{extract_json, DynWebSearch};
use crate::model::RawSourceItem;

/// Upper bound on interest-driven queries per fetch.
pub const MAX_INTEREST_SEARCHES: usize = 20;
const TITLE_CHARS: usize = 300;
const SUMMARY_CHARS: usize = 1500;

/// `ISO 8601` datetime or plain date; `None` when unparseable.
fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Stories from a discovery answer (`stories`, or `results`). Entries need a
/// title, url and summary.
pub fn parse_stories(text: &str, query: &DiscoveryQuery, now: DateTime<Utc>) -> Result<Vec<RawSourceItem>> {
    let v = extract_json(text).with_context(|| format!("discovery answer for {}", query.label))?;
    let stories = match v.get("stories").or_else(|| v.get("results")) {
        Some(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };

    let mut out = Vec::with_capacity(stories.len());
    for s in stories {
        let title = clean_text(&text_or(s.get("title"), ""), TITLE_CHARS);
        let url = text_or(s.get("url"), "");
        let summary = clean_text(&text_or(s.get("summary"), ""), SUMMARY_CHARS);
        if title.is_empty() || url.is_empty() || summary.is_empty() {
            continue;
        }
        let published_at = s
            .get("published_date")
            .and_then(Value::as_str)
            .and_then(parse_published)
            .unwrap_or(now);
        out.push(RawSourceItem {
            id: short_digest(&normalize_url(&url)),
            title,
            raw_content: summary.clone(),
            description: summary,
            source_name: text_or(s.get("source"), &query.label),
            url,
            published_at,
            fetched_at: now,
            category: query.category,
            sub_category: query.sub_category,
            processed: false,
        });
    }
    Ok(out)
}

/// One discovery query. An attached categorizer overrides the query's
/// category when its confidence is above `min_confidence`.
pub struct WebSearchDiscovery {
    search: DynWebSearch,
    query: DiscoveryQuery,
    categorizer: Option<Arc<Categorizer>>,
    min_confidence: u8,
}

impl WebSearchDiscovery {
    pub fn new(search: DynWebSearch, query: DiscoveryQuery) -> Self {
        Self {
            search,
            query,
            categorizer: None,
            min_confidence: 50,
        }
    }

    pub fn with_categorizer(mut self, categorizer: Arc<Categorizer>, min_confidence: u8) -> Self {
        self.categorizer = Some(categorizer);
        self.min_confidence = min_confidence;
        self
    }

    async fn recategorize(&self, items: &mut [RawSourceItem]) {
        let Some(cat) = self.categorizer.as_ref().filter(|c| c.is_configured()) else {
            return;
        };
        let inputs: Vec<(String, String)> = items
            .iter()
            .map(|i| (i.title.clone(), i.description.clone()))
            .collect();
        let verdicts = cat.categorize_batch(&inputs).await;
        for (item, verdict) in items.iter_mut().zip(verdicts) {
            if let Some(v) = verdict.filter(|v| v.confidence > self.min_confidence) {
                item.category = v.category;
                item.sub_category = v.sub_category;
            }
        }
    }
}

#[async_trait]
impl SourceProvider for WebSearchDiscovery {
    async fn fetch(&self) -> Result<Vec<RawSourceItem>> {
        if !self.search.is_configured() {
            return Err(anyhow!("web-search completion is not configured"));
        }
        let completion = self
            .search
            .complete_with_search(&self.query.prompt)
            .await
            .with_context(|| format!("discovery search {}", self.query.label))?;
        let mut items = parse_stories(&completion.text, &self.query, Utc::now())?;
        self.recategorize(&mut items).await;
        debug!(
            target: "ingest",
            query = %self.query.label,
            stories = items.len(),
            searches = completion.search_call_count,
            "discovery finished"
        );
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.query.label
    }
}

/// One discovery query per registered interest, run concurrently. Failed
/// queries are logged and contribute nothing.
pub struct InterestDiscovery {
    search: DynWebSearch,
    registry: Arc<InterestRegistry>,
    categorizer: Option<Arc<Categorizer>>,
    min_confidence: u8,
}

impl InterestDiscovery {
    pub fn new(search: DynWebSearch, registry: Arc<InterestRegistry>) -> Self {
        Self {
            search,
            registry,
            categorizer: None,
            min_confidence: 50,
        }
    }

    pub fn with_categorizer(mut self, categorizer: Arc<Categorizer>, min_confidence: u8) -> Self {
        self.categorizer = Some(categorizer);
        self.min_confidence = min_confidence;
        self
    }
}

#[async_trait]
impl SourceProvider for InterestDiscovery {
    async fn fetch(&self) -> Result<Vec<RawSourceItem>> {
        let providers: Vec<WebSearchDiscovery> = self
            .registry
            .names()
            .iter()
            .take(MAX_INTEREST_SEARCHES)
            .map(|name| {
                let p = WebSearchDiscovery::new(self.search.clone(), DiscoveryQuery::for_interest(name));
                match &self.categorizer {
                    Some(c) => p.with_categorizer(c.clone(), self.min_confidence),
                    None => p,
                }
            })
            .collect();

        let results = join_all(providers.iter().map(|p| p.fetch())).await;
        let mut out = Vec::new();
        for (p, res) in providers.iter().zip(results) {
            match res {
                Ok(mut items) => out.append(&mut items),
                Err(e) => warn!(target: "ingest", query = %p.name(), error = %e, "interest discovery failed"),
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "interest-discovery"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, SubCategory};

    fn query() -> DiscoveryQuery {
        DiscoveryQuery::new("regional", Category::Regional, SubCategory::General, "find news")
    }

    #[test]
    fn stories_and_results_keys_with_required_fields() {
        let now = Utc::now();
        let text = r#"```json
{"stories": [
  {"title": "EU enige om budget", "source": "DW", "url": "https://dw.com/a", "summary": "Aftale i Bruxelles.", "published_date": "2025-10-01T06:00:00Z"},
  {"title": "Mangler url", "summary": "x"},
  {"title": "Uden kilde", "url": "https://x.eu/b", "summary": "y", "published_date": "i går"}
]}
```"#;
        let items = parse_stories(text, &query(), now).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source_name, "DW");
        assert_eq!(items[0].published_at.to_rfc3339(), "2025-10-01T06:00:00+00:00");
        assert_eq!(items[0].category, Category::Regional);
        assert_eq!(items[1].source_name, "regional");
        assert_eq!(items[1].published_at, now);

        let alt = r#"{"results": [{"title": "T", "url": "https://u.dk", "summary": "S", "published_date": "2025-09-30"}]}"#;
        let items = parse_stories(alt, &query(), now).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].published_at.to_rfc3339(), "2025-09-30T00:00:00+00:00");

        assert!(parse_stories(r#"{"other": 1}"#, &query(), now).unwrap().is_empty());
        assert!(parse_stories("nothing", &query(), now).is_err());
    }
}
