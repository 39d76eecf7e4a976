// src/categorize.rs
//! Fast-path story categorization with a TTL cache keyed by normalized title.

use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::config::{CategorizeConfig, FactCheckConfig};
use crate::dedup::{normalize_title, title_digest};
use crate::llm::coerce::{clamp_score, coerce_enum, text_or, truthy};
use crate::llm::{extract_json, truncate_chars, with_timeout, CompletionRequest, DynTextCompletion};
use crate::metrics::ensure_metrics_described;
use crate::model::{Category, SubCategory, CATEGORY_VALUES, SUB_CATEGORY_VALUES};

const CONTENT_CHARS: usize = 1000;

const SYSTEM: &str = r#"You are a news categorization service. Classify the story and answer with one JSON object:
{"category": "domestic|regional|global|soft-news", "sub_category": "general|finance", "region": "short region name", "is_gossip": false, "confidence": 0-100}
"domestic" means Denmark, "regional" means the rest of Europe, "global" means outside Europe, "soft-news" means celebrity and gossip."#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categorization {
    pub category: Category,
    pub sub_category: SubCategory,
    pub region: String,
    pub is_gossip: bool,
    /// 0..=100
    pub confidence: u8,
}

pub struct Categorizer {
    text: DynTextCompletion,
    cache: TtlCache<String, Categorization>,
    timeout: Duration,
}

impl Categorizer {
    /// Cache sizing follows the fact-check cache policy.
    pub fn new(text: DynTextCompletion, cfg: &CategorizeConfig, cache_cfg: &FactCheckConfig) -> Self {
        ensure_metrics_described();
        Self {
            text,
            cache: TtlCache::new(
                chrono::Duration::minutes(cache_cfg.cache_ttl_mins),
                cache_cfg.cache_capacity,
                cache_cfg.cache_evict_batch,
            ),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.text.is_configured()
    }

    /// `None` on any failure; callers keep their own category.
    pub async fn categorize(&self, title: &str, content: &str) -> Option<Categorization> {
        let key = normalize_title(title);
        if key.is_empty() {
            return None;
        }
        if let Some(hit) = self.cache.get(&key) {
            counter!("categorize_cache_hits_total").increment(1);
            return Some(hit);
        }

        let req = CompletionRequest::json(
            SYSTEM,
            format!("Headline: {title}\nText: {}", truncate_chars(content, CONTENT_CHARS)),
            0.1,
        );
        let parsed = with_timeout(self.timeout, self.text.complete(&req))
            .await
            .and_then(|raw| extract_json(&raw));
        let v = match parsed {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "categorize", title = %title_digest(title), error = %e, "categorization failed");
                return None;
            }
        };

        let result = Categorization {
            category: coerce_enum(v.get("category"), CATEGORY_VALUES, Category::Global),
            sub_category: coerce_enum(v.get("sub_category"), SUB_CATEGORY_VALUES, SubCategory::General),
            region: text_or(v.get("region"), ""),
            is_gossip: truthy(v.get("is_gossip")),
            confidence: clamp_score(v.get("confidence"), 0) as u8,
        };
        debug!(
            target: "categorize",
            title = %title_digest(title),
            category = result.category.as_str(),
            confidence = result.confidence,
            "categorized"
        );
        self.cache.insert(key, result.clone());
        Some(result)
    }

    /// Categorize `(title, content)` pairs concurrently; output aligns with input.
    pub async fn categorize_batch(&self, items: &[(String, String)]) -> Vec<Option<Categorization>> {
        join_all(items.iter().map(|(t, c)| self.categorize(t, c))).await
    }
}
