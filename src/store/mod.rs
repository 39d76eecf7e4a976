// src/store/mod.rs
//! Persistence collaborator. The pipeline only needs the operations on
//! [`Store`]; `MemoryStore` backs the binary and the tests.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::dedup::normalize_url;
use crate::model::{Category, FactCheckResult, GeneratedArticle, RawSourceItem, SubCategory};

/// Narrowing for the published-article feed. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub category: Option<Category>,
    pub sub_category: Option<SubCategory>,
    /// Exact interest tag.
    pub tag: Option<String>,
}

impl ArticleFilter {
    pub fn matches(&self, a: &GeneratedArticle) -> bool {
        self.category.map_or(true, |c| a.category == c)
            && self.sub_category.map_or(true, |s| a.sub_category == s)
            && self
                .tag
                .as_deref()
                .map_or(true, |t| a.interest_tags.iter().any(|x| x == t))
    }
}

/// One page of the feed plus the total number of matching articles.
#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
    pub articles: Vec<GeneratedArticle>,
    pub count: usize,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert new sources; rows whose normalized URL already exists are
    /// skipped. Returns the number inserted.
    async fn upsert_raw_sources(&self, items: &[RawSourceItem]) -> Result<usize>;

    /// Unprocessed sources fetched at or after `since`, newest first.
    async fn unprocessed_sources(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<RawSourceItem>>;

    async fn mark_processed(&self, ids: &[String]) -> Result<()>;

    async fn insert_article(&self, article: &GeneratedArticle) -> Result<()>;

    /// Titles of articles created at or after `since`, newest first.
    async fn recent_article_titles(&self, since: DateTime<Utc>) -> Result<Vec<String>>;

    /// Source URLs backing articles created at or after `since`.
    async fn recent_article_source_urls(&self, since: DateTime<Utc>) -> Result<Vec<String>>;

    async fn update_article_fact_fields(
        &self,
        id: &str,
        fact_score: i32,
        fact_details: &FactCheckResult,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn article_by_id(&self, id: &str) -> Result<Option<GeneratedArticle>>;

    /// Published articles matching `filter`, newest first, `limit` rows after
    /// skipping `offset`.
    async fn recent_articles(&self, filter: &ArticleFilter, limit: usize, offset: usize) -> Result<ArticlePage>;
}

#[derive(Debug, Default)]
struct Tables {
    sources: Vec<RawSourceItem>,
    source_urls: HashSet<String>,
    articles: Vec<GeneratedArticle>,
    article_index: HashMap<String, usize>,
}

/// In-process store. Each operation holds one lock, so the URL-unique insert
/// and `mark_processed` are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored source, in insertion order.
    pub fn sources(&self) -> Vec<RawSourceItem> {
        self.tables.read().sources.clone()
    }

    pub fn articles(&self) -> Vec<GeneratedArticle> {
        self.tables.read().articles.clone()
    }

    pub fn source(&self, id: &str) -> Option<RawSourceItem> {
        self.tables.read().sources.iter().find(|s| s.id == id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_raw_sources(&self, items: &[RawSourceItem]) -> Result<usize> {
        let mut t = self.tables.write();
        let mut inserted = 0;
        for item in items {
            if t.source_urls.insert(normalize_url(&item.url)) {
                t.sources.push(item.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn unprocessed_sources(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<RawSourceItem>> {
        let t = self.tables.read();
        let mut out: Vec<RawSourceItem> = t
            .sources
            .iter()
            .filter(|s| !s.processed && s.fetched_at >= since)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        out.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn mark_processed(&self, ids: &[String]) -> Result<()> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut t = self.tables.write();
        for s in t.sources.iter_mut().filter(|s| ids.contains(s.id.as_str())) {
            s.processed = true;
        }
        Ok(())
    }

    async fn insert_article(&self, article: &GeneratedArticle) -> Result<()> {
        let mut t = self.tables.write();
        if t.article_index.contains_key(&article.id) {
            return Err(anyhow!("article {} already exists", article.id));
        }
        let idx = t.articles.len();
        t.articles.push(article.clone());
        t.article_index.insert(article.id.clone(), idx);
        Ok(())
    }

    async fn recent_article_titles(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let t = self.tables.read();
        Ok(t.articles
            .iter()
            .rev()
            .filter(|a| a.created_at >= since)
            .map(|a| a.title.clone())
            .collect())
    }

    async fn recent_article_source_urls(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let t = self.tables.read();
        Ok(t.articles
            .iter()
            .filter(|a| a.created_at >= since)
            .flat_map(|a| a.sources.iter().map(|s| s.url.clone()))
            .collect())
    }

    async fn update_article_fact_fields(
        &self,
        id: &str,
        fact_score: i32,
        fact_details: &FactCheckResult,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut t = self.tables.write();
        let idx = *t
            .article_index
            .get(id)
            .ok_or_else(|| anyhow!("article {id} not found"))?;
        let article = &mut t.articles[idx];
        article.fact_score = fact_score;
        article.fact_details = Some(fact_details.clone());
        article.updated_at = updated_at;
        Ok(())
    }

    async fn article_by_id(&self, id: &str) -> Result<Option<GeneratedArticle>> {
        let t = self.tables.read();
        Ok(t.article_index.get(id).map(|&i| t.articles[i].clone()))
    }

    async fn recent_articles(&self, filter: &ArticleFilter, limit: usize, offset: usize) -> Result<ArticlePage> {
        let t = self.tables.read();
        let mut matching: Vec<&GeneratedArticle> = t
            .articles
            .iter()
            .rev()
            .filter(|a| a.published && filter.matches(a))
            .collect();
        // stable: equal timestamps keep newest-inserted first
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(ArticlePage {
            count: matching.len(),
            articles: matching.into_iter().skip(offset).take(limit).cloned().collect(),
        })
    }
}
