// src/config/mod.rs
//! Runtime configuration loaded from `config/newsdesk.toml`.
//!
//! Every field has a serde default, so a partial file (or no file at all)
//! yields a working configuration. `api_key = "ENV"` is resolved from the
//! process environment at load time.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::{Category, SubCategory};

pub const ENV_PATH: &str = "NEWSDESK_CONFIG_PATH";
pub const DEFAULT_PATH: &str = "config/newsdesk.toml";
/// Key variables tried in order when `api_key = "ENV"`.
pub const API_KEY_VARS: &[&str] = &["XAI_API_KEY", "GROK_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub ingest: IngestConfig,
    pub factcheck: FactCheckConfig,
    pub categorize: CategorizeConfig,
    pub interests: InterestsConfig,
    pub feeds: Vec<FeedConfig>,
    pub discovery: Vec<DiscoveryQuery>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            ingest: IngestConfig::default(),
            factcheck: FactCheckConfig::default(),
            categorize: CategorizeConfig::default(),
            interests: InterestsConfig::default(),
            feeds: Vec::new(),
            discovery: default_discovery(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Literal key, `"ENV"`, or empty. Empty after resolution means disabled.
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub search_model: String,
    pub search_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: "ENV".into(),
            base_url: "https://api.x.ai/v1".into(),
            chat_model: "grok-3".into(),
            search_model: "grok-4-1-fast-non-reasoning".into(),
            search_temperature: 0.3,
        }
    }
}

impl LlmConfig {
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_key.trim().eq_ignore_ascii_case("env")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub articles_per_window: u32,
    pub window_mins: i64,
    pub timeout_secs: u64,
    pub temperature: f32,
    /// Language the articles are written in.
    pub language: String,
    /// Per-source content excerpt length in the prompt.
    pub excerpt_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            articles_per_window: 50,
            window_mins: 60,
            timeout_secs: 90,
            temperature: 0.4,
            language: "Danish".into(),
            excerpt_chars: 1500,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_sources_per_run: usize,
    pub max_articles_per_run: usize,
    pub source_window_hours: i64,
    pub title_window_hours: i64,
    pub store_timeout_secs: u64,
    pub provider_timeout_secs: u64,
    pub eager_fact_check: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_sources_per_run: 25,
            max_articles_per_run: 5,
            source_window_hours: 24,
            title_window_hours: 48,
            store_timeout_secs: 10,
            provider_timeout_secs: 30,
            eager_fact_check: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactCheckConfig {
    pub search_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub cache_ttl_mins: i64,
    pub cache_capacity: usize,
    pub cache_evict_batch: usize,
}

impl Default for FactCheckConfig {
    fn default() -> Self {
        Self {
            search_timeout_secs: 45,
            fallback_timeout_secs: 20,
            cache_ttl_mins: 30,
            cache_capacity: 500,
            cache_evict_batch: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizeConfig {
    pub timeout_secs: u64,
    /// Verdicts at or below this confidence do not override a query's category.
    pub min_confidence: u8,
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            min_confidence: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestsConfig {
    pub defaults: Vec<String>,
    /// Interest name -> keywords; replaces the curated list for that name.
    pub keywords: HashMap<String, Vec<String>>,
}

impl Default for InterestsConfig {
    fn default() -> Self {
        Self {
            defaults: crate::interest::DEFAULT_INTERESTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keywords: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub category: Category,
    #[serde(default)]
    pub sub_category: SubCategory,
}

/// One web-search discovery prompt and where its stories land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    pub label: String,
    pub category: Category,
    #[serde(default)]
    pub sub_category: SubCategory,
    pub prompt: String,
}

const STORY_SHAPE: &str = r#"Return ONLY valid JSON, no markdown:
{"stories": [{"title": "...", "source": "...", "url": "...", "summary": "one sentence", "published_date": "ISO 8601 datetime"}]}
Every story needs its real source URL, and URLs must be unique."#;

impl DiscoveryQuery {
    pub fn new(label: &str, category: Category, sub_category: SubCategory, ask: &str) -> Self {
        Self {
            label: label.to_string(),
            category,
            sub_category,
            prompt: format!("{ask}\n\n{STORY_SHAPE}"),
        }
    }

    /// Query for a registered interest; stories are recategorized downstream.
    pub fn for_interest(name: &str) -> Self {
        Self::new(
            name,
            Category::Global,
            SubCategory::General,
            &format!(
                "Search the web for today's latest news about {name}. Find 3-6 current stories from reputable outlets."
            ),
        )
    }
}

pub fn default_discovery() -> Vec<DiscoveryQuery> {
    vec![
        DiscoveryQuery::new(
            "domestic",
            Category::Domestic,
            SubCategory::General,
            "Search the web for the most important Danish news stories from today, from Danish media such as DR, TV2, Berlingske and Politiken. Find 8-12 stories.",
        ),
        DiscoveryQuery::new(
            "domestic-finance",
            Category::Domestic,
            SubCategory::Finance,
            "Search the web for today's Danish business and economic news: listed companies, housing market, interest rates. Find 5-8 stories.",
        ),
        DiscoveryQuery::new(
            "regional",
            Category::Regional,
            SubCategory::General,
            "Search the web for the most important European news from today, excluding Denmark-specific stories. Find 6-10 stories.",
        ),
        DiscoveryQuery::new(
            "global",
            Category::Global,
            SubCategory::General,
            "Search the web for today's most important world news outside Europe: geopolitics, conflicts, major events. Find 6-10 stories.",
        ),
    ]
}

impl PipelineConfig {
    /// Parse a TOML file and resolve `"ENV"` credentials.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.resolve_env();
        Ok(cfg)
    }

    /// `$NEWSDESK_CONFIG_PATH`, then `config/newsdesk.toml`, then defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        let mut cfg = Self::default();
        cfg.resolve_env();
        Ok(cfg)
    }

    /// Replace `api_key = "ENV"` with the first set key variable (or empty).
    pub fn resolve_env(&mut self) {
        if self.llm.api_key.trim().eq_ignore_ascii_case("env") {
            self.llm.api_key = API_KEY_VARS
                .iter()
                .filter_map(|v| std::env::var(v).ok())
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
                .unwrap_or_default();
        }
        if self.generation.articles_per_window == 0 {
            self.generation.articles_per_window = GenerationConfig::default().articles_per_window;
        }
        if self.generation.window_mins <= 0 {
            self.generation.window_mins = GenerationConfig::default().window_mins;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_keys() {
        for v in API_KEY_VARS {
            env::remove_var(v);
        }
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            [ingest]
            max_articles_per_run = 9

            [[feeds]]
            name = "DR"
            url = "https://www.dr.dk/nyheder/service/feeds/senestenyt"
            category = "danmark"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.ingest.max_articles_per_run, 9);
        assert_eq!(cfg.ingest.max_sources_per_run, 25);
        assert_eq!(cfg.generation.timeout_secs, 90);
        assert_eq!(cfg.factcheck.cache_capacity, 500);
        assert_eq!(cfg.feeds[0].category, Category::Domestic);
        assert_eq!(cfg.feeds[0].sub_category, SubCategory::General);
        assert_eq!(cfg.discovery.len(), 4);
        assert_eq!(cfg.interests.defaults.len(), 5);
    }

    #[serial_test::serial]
    #[test]
    fn env_key_resolution_prefers_xai() {
        clear_keys();
        let mut cfg = PipelineConfig::default();
        cfg.resolve_env();
        assert!(!cfg.llm.has_key());

        env::set_var("GROK_API_KEY", "grok-key");
        let mut cfg = PipelineConfig::default();
        cfg.resolve_env();
        assert_eq!(cfg.llm.api_key, "grok-key");

        env::set_var("XAI_API_KEY", "xai-key");
        let mut cfg = PipelineConfig::default();
        cfg.resolve_env();
        assert_eq!(cfg.llm.api_key, "xai-key");
        clear_keys();
    }

    #[serial_test::serial]
    #[test]
    fn load_default_uses_env_path_then_fallbacks() {
        clear_keys();
        env::remove_var(ENV_PATH);
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        // no file in cwd -> defaults
        let cfg = PipelineConfig::load_default().unwrap();
        assert_eq!(cfg.ingest.max_articles_per_run, 5);
        assert_eq!(cfg.discovery.len(), 4);

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[llm]\napi_key = \"literal\"\n[generation]\narticles_per_window = 0\n").unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let cfg = PipelineConfig::load_default().unwrap();
        assert_eq!(cfg.llm.api_key, "literal");
        assert_eq!(cfg.generation.articles_per_window, 50);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(PipelineConfig::load_default().is_err());

        env::remove_var(ENV_PATH);
        env::set_current_dir(&old).unwrap();
    }
}
