//! # Data model
//! Persisted and wire-visible records: raw sources, generated articles and
//! fact-check verdicts.
//!
//! Raw sources and articles use snake_case field names (the store layout);
//! fact-check verdicts use camelCase (the HTTP compatibility surface). Enum
//! values accept the legacy Danish spellings on input so older rows read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Editorial section a story belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    #[serde(alias = "danmark")]
    Domestic,
    #[serde(alias = "europa")]
    Regional,
    #[serde(alias = "verden")]
    Global,
    #[serde(alias = "sladder")]
    SoftNews,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Domestic,
        Category::Regional,
        Category::Global,
        Category::SoftNews,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Domestic => "domestic",
            Category::Regional => "regional",
            Category::Global => "global",
            Category::SoftNews => "soft-news",
        }
    }
}

/// Accepted spellings (canonical first, then legacy aliases).
pub const CATEGORY_VALUES: &[(&str, Category)] = &[
    ("domestic", Category::Domestic),
    ("regional", Category::Regional),
    ("global", Category::Global),
    ("soft-news", Category::SoftNews),
    ("danmark", Category::Domestic),
    ("europa", Category::Regional),
    ("verden", Category::Global),
    ("sladder", Category::SoftNews),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubCategory {
    #[default]
    #[serde(alias = "generelt")]
    General,
    #[serde(alias = "finans")]
    Finance,
}

impl SubCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SubCategory::General => "general",
            SubCategory::Finance => "finance",
        }
    }
}

pub const SUB_CATEGORY_VALUES: &[(&str, SubCategory)] = &[
    ("general", SubCategory::General),
    ("finance", SubCategory::Finance),
    ("generelt", SubCategory::General),
    ("finans", SubCategory::Finance),
];

/// One discovered news item before synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSourceItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Natural dedup key (compared in normalized form).
    pub url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub category: Category,
    #[serde(default)]
    pub sub_category: SubCategory,
    #[serde(default)]
    pub raw_content: String,
    #[serde(default)]
    pub processed: bool,
}

/// Provenance record attached to an article, one per contributing source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSource {
    pub title: String,
    pub url: String,
    pub source_name: String,
}

impl From<&RawSourceItem> for ArticleSource {
    fn from(s: &RawSourceItem) -> Self {
        Self {
            title: s.title.clone(),
            url: s.url.clone(),
            source_name: s.source_name.clone(),
        }
    }
}

/// `fact_score` value meaning "not yet checked" on articles and "error" on verdicts.
pub const SCORE_UNKNOWN: i32 = -1;

/// Synthesized, published article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub id: String,
    pub title: String,
    pub summary: String,
    /// Markdown.
    pub body: String,
    pub category: Category,
    pub sub_category: SubCategory,
    /// `-1` or `0..=100`.
    pub fact_score: i32,
    pub fact_details: Option<FactCheckResult>,
    #[serde(default)]
    pub interest_tags: Vec<String>,
    /// Never empty.
    pub sources: Vec<ArticleSource>,
    #[serde(default)]
    pub is_gossip: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    True,
    MostlyTrue,
    Mixed,
    MostlyFalse,
    False,
    Unverified,
}

pub const VERDICT_VALUES: &[(&str, Verdict)] = &[
    ("true", Verdict::True),
    ("mostly-true", Verdict::MostlyTrue),
    ("mixed", Verdict::Mixed),
    ("mostly-false", Verdict::MostlyFalse),
    ("false", Verdict::False),
    ("unverified", Verdict::Unverified),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMethod {
    WebSearch,
    AiOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub text: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_sources: Option<Vec<SourceLink>>,
}

/// Credibility verdict with per-claim breakdown.
///
/// `verification_method == WebSearch` implies `sources_consulted > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckResult {
    pub score: i32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub claims: Vec<Claim>,
    #[serde(default, alias = "sources_checked")]
    pub sources: Vec<String>,
    #[serde(default)]
    pub source_links: Vec<SourceLink>,
    #[serde(default)]
    pub sources_consulted: u32,
    #[serde(default = "default_method")]
    pub verification_method: VerificationMethod,
    #[serde(default = "Utc::now")]
    pub checked_at: DateTime<Utc>,
}

fn default_method() -> VerificationMethod {
    VerificationMethod::AiOnly
}

impl FactCheckResult {
    /// Verdict for a check that could not be completed. Callers treat it as unknown.
    pub fn failed(summary: impl Into<String>) -> Self {
        Self {
            score: SCORE_UNKNOWN,
            summary: summary.into(),
            claims: Vec::new(),
            sources: Vec::new(),
            source_links: Vec::new(),
            sources_consulted: 0,
            verification_method: VerificationMethod::AiOnly,
            checked_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.score == SCORE_UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_enum_spellings_read_back() {
        let c: Category = serde_json::from_str("\"sladder\"").unwrap();
        assert_eq!(c, Category::SoftNews);
        let s: SubCategory = serde_json::from_str("\"finans\"").unwrap();
        assert_eq!(s, SubCategory::Finance);
        assert_eq!(serde_json::to_string(&Category::SoftNews).unwrap(), "\"soft-news\"");
    }

    #[test]
    fn fact_check_wire_names_are_camel_case() {
        let r = FactCheckResult::failed("nope");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["score"], -1);
        assert_eq!(v["verificationMethod"], "ai-only");
        assert_eq!(v["sourcesConsulted"], 0);
        assert!(v.get("sourceLinks").is_some());
        assert!(v.get("checkedAt").is_some());
    }

    #[test]
    fn legacy_fact_details_deserialize() {
        let raw = r#"{"score": 80, "claims": [{"text": "x", "verdict": "mostly-true", "explanation": "y"}], "sources_checked": ["dr.dk"]}"#;
        let r: FactCheckResult = serde_json::from_str(raw).unwrap();
        assert_eq!(r.sources, vec!["dr.dk".to_string()]);
        assert_eq!(r.claims[0].verdict, Verdict::MostlyTrue);
        assert_eq!(r.verification_method, VerificationMethod::AiOnly);
    }
}
