// src/generate/mod.rs
//! Article synthesis: one completion call per source group, with a shared
//! rate limiter, a request timeout and field-level coercion of the response.

pub mod prompt;
pub mod rate_limit;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::dedup::{title_digest, SourceGroup};
use crate::llm::coerce::{clamp_score, coerce_enum, parse_claims, string_list, text_or, truthy};
use crate::llm::{extract_json, with_timeout, CompletionRequest, DynTextCompletion, LlmError};
use crate::model::{
    Category, FactCheckResult, GeneratedArticle, RawSourceItem, SubCategory, VerificationMethod,
    CATEGORY_VALUES, SUB_CATEGORY_VALUES,
};

pub use rate_limit::RateLimiter;

/// Score used when the model's `fact_score` is missing or not numeric.
pub const DEFAULT_FACT_SCORE: i32 = 70;
/// Bodies shorter than this indicate a malformed response.
pub const MIN_BODY_CHARS: usize = 50;

/// Why a group produced no article. `RateLimited` and `StaleSources` are
/// expected outcomes; the rest are per-group errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationFailure {
    #[error("rate limit reached ({0} articles per window)")]
    RateLimited(u32),
    #[error("model flagged the sources as stale")]
    StaleSources,
    #[error(transparent)]
    Completion(#[from] LlmError),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("body too short ({0} chars)")]
    BodyTooShort(usize),
    #[error("source group is empty")]
    EmptyGroup,
}

impl GenerationFailure {
    /// Label for logs and the `articles_skipped_total{reason}` series.
    pub fn reason(&self) -> &'static str {
        match self {
            GenerationFailure::RateLimited(_) => "rate_limited",
            GenerationFailure::StaleSources => "stale",
            GenerationFailure::Completion(_) => "completion",
            GenerationFailure::Malformed(_) => "malformed",
            GenerationFailure::BodyTooShort(_) => "body_too_short",
            GenerationFailure::EmptyGroup => "empty_group",
        }
    }

    /// Business-rule outcome rather than a failure.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            GenerationFailure::RateLimited(_) | GenerationFailure::StaleSources
        )
    }
}

/// Validated article fields from one model response.
///
/// | field           | rule                                               |
/// |-----------------|----------------------------------------------------|
/// | `title`         | non-blank string, else primary source title        |
/// | `summary`       | non-blank string, else primary source description  |
/// | `body`          | required, at least `MIN_BODY_CHARS` characters     |
/// | `fact_score`    | number clamped to 0..=100, else `DEFAULT_FACT_SCORE` |
/// | `category`      | nearest enum value, else the group's category      |
/// | `sub_category`  | nearest enum value, else the group's sub-category  |
/// | `interest_tags` | array of strings, else empty                       |
/// | `is_gossip`     | truthy value, else false                           |
/// | `fact_details`  | `claims[]` with coerced verdicts, else empty       |
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDraft {
    pub title: String,
    pub summary: String,
    pub body: String,
    pub category: Category,
    pub sub_category: SubCategory,
    pub fact_score: i32,
    pub fact_details: FactCheckResult,
    pub interest_tags: Vec<String>,
    pub is_gossip: bool,
}

impl ArticleDraft {
    pub fn from_response(
        v: &Value,
        primary: &RawSourceItem,
        now: DateTime<Utc>,
    ) -> Result<Self, GenerationFailure> {
        if truthy(v.get("skip")) {
            return Err(GenerationFailure::StaleSources);
        }

        let body = text_or(v.get("body"), "");
        let body_chars = body.chars().count();
        if body_chars < MIN_BODY_CHARS {
            return Err(GenerationFailure::BodyTooShort(body_chars));
        }

        let fact_score = clamp_score(v.get("fact_score"), DEFAULT_FACT_SCORE);
        let details = v.get("fact_details");
        let mut interest_tags: Vec<String> = Vec::new();
        for tag in string_list(v.get("interest_tags")) {
            if !interest_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                interest_tags.push(tag);
            }
        }

        Ok(Self {
            title: text_or(v.get("title"), &primary.title),
            summary: text_or(v.get("summary"), &primary.description),
            body,
            category: coerce_enum(v.get("category"), CATEGORY_VALUES, primary.category),
            sub_category: coerce_enum(
                v.get("sub_category"),
                SUB_CATEGORY_VALUES,
                primary.sub_category,
            ),
            fact_score,
            fact_details: FactCheckResult {
                score: fact_score,
                summary: String::new(),
                claims: parse_claims(details.and_then(|d| d.get("claims")), &[]),
                sources: string_list(details.and_then(|d| {
                    d.get("sources").or_else(|| d.get("sources_checked"))
                })),
                source_links: Vec::new(),
                sources_consulted: 0,
                verification_method: VerificationMethod::AiOnly,
                checked_at: now,
            },
            interest_tags,
            is_gossip: truthy(v.get("is_gossip")),
        })
    }

    fn into_article(self, group: &SourceGroup, now: DateTime<Utc>) -> GeneratedArticle {
        GeneratedArticle {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            summary: self.summary,
            body: self.body,
            category: self.category,
            sub_category: self.sub_category,
            fact_score: self.fact_score,
            fact_details: Some(self.fact_details),
            interest_tags: self.interest_tags,
            sources: group.provenance(),
            is_gossip: self.is_gossip,
            created_at: now,
            updated_at: now,
            published: true,
        }
    }
}

pub struct ArticleGenerator {
    text: DynTextCompletion,
    limiter: Arc<RateLimiter>,
    cfg: GenerationConfig,
}

impl ArticleGenerator {
    pub fn new(text: DynTextCompletion, limiter: Arc<RateLimiter>, cfg: GenerationConfig) -> Self {
        Self { text, limiter, cfg }
    }

    /// Limiter sized from the config window.
    pub fn limiter_from(cfg: &GenerationConfig) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            cfg.articles_per_window,
            chrono::Duration::minutes(cfg.window_mins),
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.text.is_configured()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Synthesize one article from `group`. Never panics on bad model output.
    pub async fn generate<S: AsRef<str>>(
        &self,
        group: &SourceGroup,
        interests: &[S],
    ) -> Result<GeneratedArticle, GenerationFailure> {
        let primary = group.members.first().ok_or(GenerationFailure::EmptyGroup)?;
        let digest = title_digest(&primary.title);

        if !self.limiter.try_acquire() {
            info!(target: "generate", topic = %digest, limit = self.limiter.limit(), "rate limit reached");
            return Err(GenerationFailure::RateLimited(self.limiter.limit()));
        }

        let now = Utc::now();
        let req = CompletionRequest::json(
            prompt::system_prompt(&self.cfg.language),
            prompt::user_prompt(group, interests, self.cfg.excerpt_chars, now),
            self.cfg.temperature,
        );

        let raw = with_timeout(self.cfg.timeout(), self.text.complete(&req))
            .await
            .map_err(|e| {
                warn!(target: "generate", topic = %digest, error = %e, "completion failed");
                GenerationFailure::Completion(e)
            })?;

        let parsed = extract_json(&raw).map_err(|e| {
            warn!(target: "generate", topic = %digest, error = %e, "unparseable response");
            GenerationFailure::Malformed(e.to_string())
        })?;

        let draft = ArticleDraft::from_response(&parsed, primary, now)?;
        debug!(
            target: "generate",
            topic = %digest,
            members = group.len(),
            fact_score = draft.fact_score,
            category = draft.category.as_str(),
            "article drafted"
        );
        Ok(draft.into_article(group, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primary() -> RawSourceItem {
        RawSourceItem {
            id: "s1".into(),
            title: "Primary headline".into(),
            description: "Primary description".into(),
            url: "https://example.com/1".into(),
            source_name: "DR".into(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            category: Category::Regional,
            sub_category: SubCategory::Finance,
            raw_content: String::new(),
            processed: false,
        }
    }

    fn body() -> String {
        "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(3)
    }

    #[test]
    fn missing_fields_fall_back_to_primary() {
        let v = json!({"body": body(), "fact_score": "banana", "category": "sports", "interest_tags": "AI"});
        let d = ArticleDraft::from_response(&v, &primary(), Utc::now()).unwrap();
        assert_eq!(d.title, "Primary headline");
        assert_eq!(d.summary, "Primary description");
        assert_eq!(d.fact_score, 70);
        assert_eq!(d.category, Category::Regional);
        assert_eq!(d.sub_category, SubCategory::Finance);
        assert!(d.interest_tags.is_empty());
        assert!(!d.is_gossip);
    }

    #[test]
    fn present_fields_are_coerced() {
        let v = json!({
            "title": "New", "summary": "S", "body": body(), "fact_score": 250,
            "category": "sladder", "sub_category": "general",
            "interest_tags": ["AI", "ai", "Tesla"], "is_gossip": true,
            "fact_details": {"claims": [{"text": "c", "verdict": "Mostly True"}], "sources_checked": ["dr.dk"]}
        });
        let d = ArticleDraft::from_response(&v, &primary(), Utc::now()).unwrap();
        assert_eq!(d.fact_score, 100);
        assert_eq!(d.category, Category::SoftNews);
        assert_eq!(d.sub_category, SubCategory::General);
        assert_eq!(d.interest_tags, vec!["AI", "Tesla"]);
        assert!(d.is_gossip);
        assert_eq!(d.fact_details.claims.len(), 1);
        assert_eq!(d.fact_details.sources, vec!["dr.dk"]);
    }

    #[test]
    fn skip_and_short_body_are_rejected() {
        let stale = json!({"skip": true, "body": body()});
        assert_eq!(
            ArticleDraft::from_response(&stale, &primary(), Utc::now()),
            Err(GenerationFailure::StaleSources)
        );
        let short = json!({"title": "t", "body": "too short"});
        assert_eq!(
            ArticleDraft::from_response(&short, &primary(), Utc::now()),
            Err(GenerationFailure::BodyTooShort(9))
        );
        let missing = json!({"title": "t"});
        assert_eq!(
            ArticleDraft::from_response(&missing, &primary(), Utc::now()),
            Err(GenerationFailure::BodyTooShort(0))
        );
    }

    #[test]
    fn failure_reasons() {
        assert!(GenerationFailure::StaleSources.is_expected());
        assert!(!GenerationFailure::BodyTooShort(3).is_expected());
        assert_eq!(
            GenerationFailure::Completion(LlmError::Empty).reason(),
            "completion"
        );
    }
}
