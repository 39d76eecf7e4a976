// src/factcheck/mod.rs
//! Fact verification: cache lookup, web-search verification, AI-only
//! fallback, and a terminal `-1` verdict when both paths fail.
//!
//! Verdicts are cached by (normalized title, source label). Forced checks
//! neither read nor write the cache; `-1` verdicts are never cached.

pub mod prompt;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::config::FactCheckConfig;
use crate::dedup::{normalize_title, title_digest};
use crate::llm::coerce::{as_number, clamp_score, parse_claims, text_or};
use crate::llm::{
    extract_json, with_timeout, CompletionRequest, DynTextCompletion, DynWebSearch, LlmError,
};
use crate::metrics::ensure_metrics_described;
use crate::model::{FactCheckResult, SourceLink, VerificationMethod};
use crate::store::Store;

pub use prompt::AI_ONLY_DISCLAIMER;

/// Source label used when the caller gives none.
pub const UNKNOWN_SOURCE: &str = "unknown";
const FALLBACK_TEMPERATURE: f32 = 0.2;

/// Input of one check. Wire shape of `POST /factcheck`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactCheckRequest {
    pub article_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub force: bool,
}

impl FactCheckRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn for_article(mut self, id: impl Into<String>) -> Self {
        self.article_id = Some(id.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default().trim()
    }

    fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    fn source(&self) -> &str {
        self.source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SOURCE)
    }
}

pub type FactCheckCache = TtlCache<String, FactCheckResult>;

pub struct FactCheckEngine {
    search: DynWebSearch,
    text: DynTextCompletion,
    cache: Arc<FactCheckCache>,
    store: Option<Arc<dyn Store>>,
    search_timeout: Duration,
    fallback_timeout: Duration,
}

impl FactCheckEngine {
    pub fn new(search: DynWebSearch, text: DynTextCompletion, cfg: &FactCheckConfig) -> Self {
        ensure_metrics_described();
        Self {
            search,
            text,
            cache: Arc::new(TtlCache::new(
                chrono::Duration::minutes(cfg.cache_ttl_mins),
                cfg.cache_capacity,
                cfg.cache_evict_batch,
            )),
            store: None,
            search_timeout: Duration::from_secs(cfg.search_timeout_secs),
            fallback_timeout: Duration::from_secs(cfg.fallback_timeout_secs),
        }
    }

    /// Enables write-back onto persisted articles.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(&self) -> &FactCheckCache {
        &self.cache
    }

    pub fn is_configured(&self) -> bool {
        self.search.is_configured() || self.text.is_configured()
    }

    pub fn cache_key(title: &str, source: &str) -> String {
        format!("{}::{}", normalize_title(title), source.trim().to_lowercase())
    }

    /// Run one check. Never fails: exhausted paths yield a `-1` verdict.
    pub async fn check(&self, req: &FactCheckRequest) -> FactCheckResult {
        let title = req.title();
        let source = req.source();
        let key = Self::cache_key(title, source);
        let digest = title_digest(title);

        if !req.force {
            if let Some(hit) = self.cache.get(&key) {
                counter!("factcheck_cache_hits_total").increment(1);
                counter!("factcheck_requests_total", "path" => "cache").increment(1);
                info!(target: "factcheck", title = %digest, "cache hit");
                self.write_back(req, &hit).await;
                return hit;
            }
        }

        let started = Instant::now();
        let result = match self.verify_with_search(title, req.content(), source).await {
            Ok(r) => r,
            Err(search_err) => {
                warn!(target: "factcheck", title = %digest, error = %search_err, "web-search verification failed; using AI-only fallback");
                match self.verify_ai_only(title, req.content(), source).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(target: "factcheck", title = %digest, error = %e, "AI-only fallback failed");
                        terminal_failure(&e)
                    }
                }
            }
        };
        histogram!("factcheck_duration_ms").record(started.elapsed().as_millis() as f64);

        let path = if result.is_failure() {
            "failed"
        } else {
            match result.verification_method {
                VerificationMethod::WebSearch => "web-search",
                VerificationMethod::AiOnly => "ai-only",
            }
        };
        counter!("factcheck_requests_total", "path" => path).increment(1);
        info!(
            target: "factcheck",
            title = %digest,
            path,
            score = result.score,
            sources = result.sources_consulted,
            "fact-check finished"
        );

        if !result.is_failure() {
            if !req.force {
                self.cache.insert(key, result.clone());
            }
            self.write_back(req, &result).await;
        }
        result
    }

    async fn verify_with_search(
        &self,
        title: &str,
        content: &str,
        source: &str,
    ) -> Result<FactCheckResult, LlmError> {
        let prompt = prompt::web_search_prompt(title, content, source);
        let completion =
            with_timeout(self.search_timeout, self.search.complete_with_search(&prompt)).await?;
        let v = extract_json(&completion.text)?;
        if as_number(v.get("score")).is_none() {
            return Err(LlmError::Malformed("verdict has no numeric score".into()));
        }

        let links = source_links(&completion.citation_urls);
        let mut result = FactCheckResult {
            score: clamp_score(v.get("score"), 0),
            summary: text_or(v.get("summary"), ""),
            claims: parse_claims(v.get("claims"), &links),
            sources: distinct_domains(&links),
            sources_consulted: links.len() as u32,
            source_links: links,
            verification_method: VerificationMethod::WebSearch,
            checked_at: Utc::now(),
        };
        if result.sources_consulted == 0 {
            // no citations: cannot claim web verification
            result.verification_method = VerificationMethod::AiOnly;
            result.summary = with_disclaimer(&result.summary);
        }
        Ok(result)
    }

    async fn verify_ai_only(
        &self,
        title: &str,
        content: &str,
        source: &str,
    ) -> Result<FactCheckResult, LlmError> {
        let req = CompletionRequest::json(
            prompt::AI_ONLY_SYSTEM,
            prompt::ai_only_user(title, content, source),
            FALLBACK_TEMPERATURE,
        );
        let raw = with_timeout(self.fallback_timeout, self.text.complete(&req)).await?;
        let v = extract_json(&raw)?;
        if as_number(v.get("score")).is_none() {
            return Err(LlmError::Malformed("verdict has no numeric score".into()));
        }
        Ok(FactCheckResult {
            score: clamp_score(v.get("score"), 0),
            summary: with_disclaimer(&text_or(v.get("summary"), "")),
            claims: parse_claims(v.get("claims"), &[]),
            sources: Vec::new(),
            source_links: Vec::new(),
            sources_consulted: 0,
            verification_method: VerificationMethod::AiOnly,
            checked_at: Utc::now(),
        })
    }

    /// Best-effort: a failed write is logged, the verdict is unaffected.
    async fn write_back(&self, req: &FactCheckRequest, result: &FactCheckResult) {
        let (Some(store), Some(id)) = (self.store.as_ref(), req.article_id.as_deref()) else {
            return;
        };
        if let Err(e) = store
            .update_article_fact_fields(id, result.score, result, Utc::now())
            .await
        {
            warn!(target: "factcheck", article_id = id, error = %e, "fact write-back failed");
        }
    }
}

fn with_disclaimer(summary: &str) -> String {
    if summary.is_empty() {
        AI_ONLY_DISCLAIMER.to_string()
    } else {
        format!("{summary} {AI_ONLY_DISCLAIMER}")
    }
}

fn terminal_failure(err: &LlmError) -> FactCheckResult {
    let summary = if err.is_not_configured() {
        format!("Fact-check unavailable: {err}.")
    } else {
        format!("Fact-check could not be completed: {err}.")
    };
    FactCheckResult::failed(summary)
}

/// Host without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn source_links(urls: &[String]) -> Vec<SourceLink> {
    let mut links: Vec<SourceLink> = Vec::new();
    for url in urls {
        let url = url.trim();
        if url.is_empty() || links.iter().any(|l| l.url == url) {
            continue;
        }
        links.push(SourceLink {
            url: url.to_string(),
            domain: domain_of(url),
            title: None,
        });
    }
    links
}

fn distinct_domains(links: &[SourceLink]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for d in links.iter().filter_map(|l| l.domain.as_ref()) {
        if !out.contains(d) {
            out.push(d.clone());
        }
    }
    out
}
