// src/ingest/mod.rs
//! Ingestion: provider collection and the bounded generation run.
//!
//! A run pulls unprocessed sources, drops those already backing an article,
//! ranks by interest, groups, and turns groups into articles up to the
//! per-run cap. Every group that is looked at has its sources marked
//! processed exactly once, whatever the outcome. Hitting the rate limit also
//! ends the run; groups after that one are left for the next run.

pub mod collect;
pub mod providers;
pub mod types;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::dedup::{group_sources, is_duplicate, normalize_url, title_digest, SourceGroup};
use crate::factcheck::{FactCheckEngine, FactCheckRequest};
use crate::generate::{ArticleGenerator, GenerationFailure};
use crate::interest::{prioritize, InterestRegistry, KeywordMap};
use crate::metrics::ensure_metrics_described;
use crate::model::GeneratedArticle;
use crate::store::Store;

pub use collect::{CollectSummary, SourceCollector};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Decode entities, strip tags, ASCII-fold curly quotes, collapse whitespace,
/// cap at `max_chars`.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let quoted = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let out = RE_WS.replace_all(&quoted, " ");
    out.trim().chars().take(max_chars).collect()
}

/// Outcome counts of one run. Wire shape of the generation trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub generated: usize,
    pub total_groups: usize,
    /// Titles of the persisted articles.
    pub articles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_duplicates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_stale: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub sources_considered: usize,
    /// Sources left after dropping those already backing an article.
    pub fresh_sources: usize,
    pub rate_limited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupOutcome {
    Generated,
    Skipped,
    Failed,
    RateLimited,
}

pub struct IngestionOrchestrator {
    store: Arc<dyn Store>,
    generator: Arc<ArticleGenerator>,
    interests: Arc<InterestRegistry>,
    keywords: KeywordMap,
    cfg: IngestConfig,
    fact_checker: Option<Arc<FactCheckEngine>>,
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<ArticleGenerator>,
        interests: Arc<InterestRegistry>,
        keywords: KeywordMap,
        cfg: IngestConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            store,
            generator,
            interests,
            keywords,
            cfg,
            fact_checker: None,
        }
    }

    /// Fact-check each new article in the background (when enabled in config).
    pub fn with_fact_checker(mut self, engine: Arc<FactCheckEngine>) -> Self {
        self.fact_checker = Some(engine);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    pub async fn run_once(&self) -> Result<RunSummary> {
        self.run_once_at(Utc::now()).await
    }

    /// One bounded run with an explicit clock for the recency windows.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        if !self.generator.is_configured() {
            return Err(anyhow!("text completion is not configured"));
        }
        counter!("ingest_runs_total").increment(1);
        gauge!("ingest_last_run_ts").set(now.timestamp() as f64);

        let source_since = now - chrono::Duration::hours(self.cfg.source_window_hours);
        let title_since = now - chrono::Duration::hours(self.cfg.title_window_hours);
        let store_timeout = Duration::from_secs(self.cfg.store_timeout_secs);

        let pulled = tokio::time::timeout(
            store_timeout,
            self.store
                .unprocessed_sources(source_since, self.cfg.max_sources_per_run),
        )
        .await
        .map_err(|_| anyhow!("loading unprocessed sources timed out"))?
        .context("loading unprocessed sources")?;

        let (mut existing_titles, used_urls) = tokio::join!(
            or_empty(store_timeout, "recent titles", self.store.recent_article_titles(title_since)),
            or_empty(store_timeout, "recent source urls", self.store.recent_article_source_urls(title_since)),
        );

        let mut summary = RunSummary {
            sources_considered: pulled.len(),
            ..RunSummary::default()
        };
        counter!("ingest_sources_considered_total").increment(pulled.len() as u64);

        let used: HashSet<String> = used_urls.iter().map(|u| normalize_url(u)).collect();
        let (already_used, fresh): (Vec<_>, Vec<_>) = pulled
            .into_iter()
            .partition(|s| used.contains(&normalize_url(&s.url)));
        if !already_used.is_empty() {
            // marked inline instead of detached; a failure is only logged
            counter!("articles_skipped_total", "reason" => "url_used").increment(already_used.len() as u64);
            let ids: Vec<String> = already_used.iter().map(|s| s.id.clone()).collect();
            self.mark_processed(&ids).await;
        }
        summary.fresh_sources = fresh.len();

        let interests = self.interests.names();
        let keywords = self.keywords.clone().merged(&interests);
        let ranked = prioritize(fresh, &interests, &keywords);
        let groups = group_sources(&ranked);
        summary.total_groups = groups.len();

        for group in &groups {
            if summary.generated >= self.cfg.max_articles_per_run {
                break;
            }
            let outcome = self
                .process_group(group, &interests, &mut existing_titles, &mut summary)
                .await;
            debug!(target: "ingest", topic = %title_digest(&group.topic), ?outcome, "group processed");
            if outcome == GroupOutcome::RateLimited {
                break;
            }
        }

        info!(
            target: "ingest",
            generated = summary.generated,
            groups = summary.total_groups,
            considered = summary.sources_considered,
            duplicates = summary.skipped_duplicates.len(),
            errors = summary.errors.len(),
            rate_limited = summary.rate_limited,
            "ingestion run finished"
        );
        Ok(summary)
    }

    /// Duplicate pre-check, generation, duplicate post-check, persistence.
    /// `existing_titles` grows with every persisted article.
    async fn process_group(
        &self,
        group: &SourceGroup,
        interests: &[String],
        existing_titles: &mut Vec<String>,
        summary: &mut RunSummary,
    ) -> GroupOutcome {
        let ids = group.member_ids();

        let pre = is_duplicate(&group.topic, existing_titles);
        if pre.is_dup {
            counter!("articles_skipped_total", "reason" => "duplicate").increment(1);
            summary.skipped_duplicates.push(pre.describe(&group.topic));
            self.mark_processed(&ids).await;
            return GroupOutcome::Skipped;
        }

        let article = match self.generator.generate(group, interests).await {
            Ok(a) => a,
            Err(GenerationFailure::RateLimited(limit)) => {
                counter!("articles_skipped_total", "reason" => "rate_limited").increment(1);
                info!(target: "ingest", limit, "rate limit reached; leaving remaining groups for the next run");
                summary.rate_limited = true;
                self.mark_processed(&ids).await;
                return GroupOutcome::RateLimited;
            }
            Err(GenerationFailure::StaleSources) => {
                counter!("articles_skipped_total", "reason" => "stale").increment(1);
                summary.skipped_stale.push(group.topic.clone());
                self.mark_processed(&ids).await;
                return GroupOutcome::Skipped;
            }
            Err(e) => {
                counter!("generation_errors_total").increment(1);
                counter!("articles_skipped_total", "reason" => e.reason()).increment(1);
                summary.errors.push(format!("{}: {e}", group.topic));
                self.mark_processed(&ids).await;
                return GroupOutcome::Failed;
            }
        };

        let post = is_duplicate(&article.title, existing_titles);
        if post.is_dup {
            counter!("articles_skipped_total", "reason" => "duplicate").increment(1);
            summary.skipped_duplicates.push(post.describe(&article.title));
            self.mark_processed(&ids).await;
            return GroupOutcome::Skipped;
        }

        if let Err(e) = self.store.insert_article(&article).await {
            counter!("generation_errors_total").increment(1);
            warn!(target: "ingest", topic = %title_digest(&group.topic), error = %e, "persisting article failed");
            summary.errors.push(format!("{}: {e:#}", group.topic));
            self.mark_processed(&ids).await;
            return GroupOutcome::Failed;
        }
        self.mark_processed(&ids).await;

        counter!("articles_generated_total").increment(1);
        existing_titles.push(article.title.clone());
        summary.articles.push(article.title.clone());
        summary.generated += 1;
        self.spawn_fact_check(&article);
        GroupOutcome::Generated
    }

    /// Failures are logged; a source left unprocessed is retried next run.
    async fn mark_processed(&self, ids: &[String]) {
        if let Err(e) = self.store.mark_processed(ids).await {
            warn!(target: "ingest", count = ids.len(), error = %e, "mark processed failed");
        }
    }

    fn spawn_fact_check(&self, article: &GeneratedArticle) {
        if !self.cfg.eager_fact_check {
            return;
        }
        let Some(engine) = self.fact_checker.clone() else {
            return;
        };
        let source = article
            .sources
            .first()
            .map(|s| s.source_name.clone())
            .unwrap_or_default();
        let req = FactCheckRequest::new(article.title.clone(), article.body.clone(), source)
            .for_article(article.id.clone());
        tokio::spawn(async move {
            engine.check(&req).await;
        });
    }
}

/// Await a store read under `limit`; errors and timeouts degrade to empty.
async fn or_empty<T, F>(limit: Duration, what: &'static str, fut: F) -> Vec<T>
where
    F: Future<Output = Result<Vec<T>>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            warn!(target: "ingest", what, error = %e, "store read failed; continuing without it");
            Vec::new()
        }
        Err(_) => {
            warn!(target: "ingest", what, "store read timed out; continuing without it");
            Vec::new()
        }
    }
}
