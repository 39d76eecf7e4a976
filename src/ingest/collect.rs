// src/ingest/collect.rs
//! Concurrent fetch from every provider, URL dedup of the union, store upsert.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::dedup::normalize_url;
use crate::ingest::types::SourceProvider;
use crate::metrics::ensure_metrics_described;
use crate::model::RawSourceItem;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectSummary {
    pub fetched: usize,
    pub unique: usize,
    pub inserted: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// First occurrence per normalized URL wins; order is preserved.
pub fn dedupe_by_url(items: Vec<RawSourceItem>) -> Vec<RawSourceItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| seen.insert(normalize_url(&s.url)))
        .collect()
}

pub struct SourceCollector {
    providers: Vec<Arc<dyn SourceProvider>>,
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl SourceCollector {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>, store: Arc<dyn Store>, timeout: Duration) -> Self {
        ensure_metrics_described();
        Self {
            providers,
            store,
            timeout,
        }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// A provider that errors or times out contributes nothing and one error line.
    pub async fn collect(&self) -> Result<CollectSummary> {
        let fetches = self.providers.iter().map(|p| async move {
            let res = match tokio::time::timeout(self.timeout, p.fetch()).await {
                Ok(r) => r,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", self.timeout)),
            };
            (p.name().to_string(), res)
        });

        let mut summary = CollectSummary::default();
        let mut all = Vec::new();
        for (name, res) in join_all(fetches).await {
            match res {
                Ok(mut items) => all.append(&mut items),
                Err(e) => {
                    warn!(target: "ingest", provider = %name, error = %e, "provider error");
                    counter!("ingest_provider_errors_total").increment(1);
                    summary.errors.push(format!("{name}: {e:#}"));
                }
            }
        }

        summary.fetched = all.len();
        let unique = dedupe_by_url(all);
        summary.unique = unique.len();
        summary.inserted = self
            .store
            .upsert_raw_sources(&unique)
            .await
            .context("upserting raw sources")?;

        info!(
            target: "ingest",
            fetched = summary.fetched,
            unique = summary.unique,
            inserted = summary.inserted,
            errors = summary.errors.len(),
            "sources collected"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, SubCategory};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Fixed(&'static str, Vec<RawSourceItem>);

    #[async_trait]
    impl SourceProvider for Fixed {
        async fn fetch(&self) -> Result<Vec<RawSourceItem>> {
            Ok(self.1.clone())
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    struct Slow;

    #[async_trait]
    impl SourceProvider for Slow {
        async fn fetch(&self) -> Result<Vec<RawSourceItem>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    struct Broken;

    #[async_trait]
    impl SourceProvider for Broken {
        async fn fetch(&self) -> Result<Vec<RawSourceItem>> {
            Err(anyhow::anyhow!("boom"))
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    fn item(id: &str, url: &str) -> RawSourceItem {
        RawSourceItem {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            url: url.into(),
            source_name: "t".into(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            category: Category::Global,
            sub_category: SubCategory::General,
            raw_content: String::new(),
            processed: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn union_dedupes_and_degrades_failed_providers() {
        let store = Arc::new(MemoryStore::new());
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(Fixed("a", vec![item("1", "https://x.dk/1/"), item("2", "https://x.dk/2")])),
            Arc::new(Fixed("b", vec![item("3", "HTTPS://X.DK/1")])),
            Arc::new(Slow),
            Arc::new(Broken),
        ];
        let c = SourceCollector::new(providers, store.clone(), Duration::from_secs(5));
        let s = c.collect().await.unwrap();
        assert_eq!(s.fetched, 3);
        assert_eq!(s.unique, 2);
        assert_eq!(s.inserted, 2);
        assert_eq!(s.errors.len(), 2);
        assert!(s.errors.iter().any(|e| e.starts_with("slow: timed out")));
        let ids: Vec<String> = store.sources().into_iter().map(|x| x.id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        // second collect inserts nothing new
        assert_eq!(c.collect().await.unwrap().inserted, 0);
    }
}
