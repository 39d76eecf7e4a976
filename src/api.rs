// src/api.rs
//! Thin HTTP surface over the pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::categorize::Categorizer;
use crate::config::{DiscoveryQuery, PipelineConfig};
use crate::factcheck::{FactCheckEngine, FactCheckRequest};
use crate::generate::ArticleGenerator;
use crate::ingest::collect::dedupe_by_url;
use crate::ingest::providers::{InterestDiscovery, RssProvider, WebSearchDiscovery};
use crate::ingest::types::SourceProvider;
use crate::ingest::{CollectSummary, IngestionOrchestrator, RunSummary, SourceCollector};
use crate::interest::{InterestRegistry, KeywordMap};
use crate::llm::xai::LlmClients;
use crate::llm::DynWebSearch;
use crate::model::{Category, FactCheckResult, GeneratedArticle, SubCategory};
use crate::store::{ArticleFilter, Store};

/// Feed page size when the caller gives none, and the hard cap.
const FEED_DEFAULT_LIMIT: usize = 20;
const FEED_MAX_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(e) => {
                warn!(target: "api", error = %format!("{e:#}"), "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub generator: Arc<ArticleGenerator>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub fact_checker: Arc<FactCheckEngine>,
    pub collector: Arc<SourceCollector>,
    pub interests: Arc<InterestRegistry>,
    search: DynWebSearch,
    categorizer: Arc<Categorizer>,
    min_confidence: u8,
    provider_timeout: Duration,
}

impl AppState {
    /// Wire every component from config, the completion collaborators and a store.
    pub fn build(cfg: &PipelineConfig, clients: LlmClients, store: Arc<dyn Store>) -> Result<Self> {
        let interests = Arc::new(InterestRegistry::with_defaults(&cfg.interests.defaults));
        let keywords = KeywordMap::curated().with_overrides(&cfg.interests.keywords);

        let generator = Arc::new(ArticleGenerator::new(
            clients.text.clone(),
            ArticleGenerator::limiter_from(&cfg.generation),
            cfg.generation.clone(),
        ));
        let fact_checker = Arc::new(
            FactCheckEngine::new(clients.search.clone(), clients.text.clone(), &cfg.factcheck)
                .with_store(store.clone()),
        );
        let categorizer = Arc::new(Categorizer::new(
            clients.text.clone(),
            &cfg.categorize,
            &cfg.factcheck,
        ));
        let min_confidence = cfg.categorize.min_confidence;

        let mut providers: Vec<Arc<dyn SourceProvider>> = Vec::new();
        for feed in &cfg.feeds {
            providers.push(Arc::new(RssProvider::from_feed(feed.clone())?));
        }
        for query in &cfg.discovery {
            providers.push(Arc::new(
                WebSearchDiscovery::new(clients.search.clone(), query.clone())
                    .with_categorizer(categorizer.clone(), min_confidence),
            ));
        }
        providers.push(Arc::new(
            InterestDiscovery::new(clients.search.clone(), interests.clone())
                .with_categorizer(categorizer.clone(), min_confidence),
        ));

        let provider_timeout = Duration::from_secs(cfg.ingest.provider_timeout_secs);
        let collector = Arc::new(SourceCollector::new(providers, store.clone(), provider_timeout));
        let orchestrator = Arc::new(
            IngestionOrchestrator::new(
                store.clone(),
                generator.clone(),
                interests.clone(),
                keywords,
                cfg.ingest.clone(),
            )
            .with_fact_checker(fact_checker.clone()),
        );

        Ok(Self {
            store,
            generator,
            orchestrator,
            fact_checker,
            collector,
            interests,
            search: clients.search,
            categorizer,
            min_confidence,
            provider_timeout,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/articles", get(list_articles))
        .route("/articles/generate", get(generate).post(generate))
        .route("/articles/{id}", get(article))
        .route("/factcheck", post(factcheck))
        .route("/sources/fetch", post(fetch_sources))
        .route("/interests", get(list_interests).post(register_interest))
        .route("/interests/search", post(search_interest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn availability(configured: bool) -> &'static str {
    if configured {
        "active"
    } else {
        "pending"
    }
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let limiter = state.generator.limiter();
    Json(json!({
        "textCompletion": availability(state.generator.is_configured()),
        "webSearch": availability(state.search.is_configured()),
        "store": "active",
        "providers": state.collector.provider_names(),
        "interests": state.interests.names(),
        "rateLimit": { "limit": limiter.limit(), "remaining": limiter.remaining() },
    }))
}

async fn generate(State(state): State<AppState>) -> Result<Json<RunSummary>, ApiError> {
    if !state.orchestrator.is_configured() {
        return Err(ApiError::Unavailable(
            "article generation unavailable: text completion is not configured".into(),
        ));
    }
    let summary = state.orchestrator.run_once().await?;
    Ok(Json(summary))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedParams {
    category: Option<Category>,
    sub_category: Option<SubCategory>,
    tag: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedOut {
    articles: Vec<GeneratedArticle>,
    count: usize,
    limit: usize,
    offset: usize,
    has_more: bool,
}

/// Published articles, newest first, optionally narrowed by section or tag.
async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedOut>, ApiError> {
    let limit = params.limit.unwrap_or(FEED_DEFAULT_LIMIT).min(FEED_MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let filter = ArticleFilter {
        category: params.category,
        sub_category: params.sub_category,
        tag: params.tag.filter(|t| !t.trim().is_empty()),
    };
    let page = state.store.recent_articles(&filter, limit, offset).await?;
    Ok(Json(FeedOut {
        has_more: page.count > offset + limit,
        count: page.count,
        articles: page.articles,
        limit,
        offset,
    }))
}

async fn article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GeneratedArticle>, ApiError> {
    state
        .store
        .article_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("article {id}")))
}

/// A request without a title borrows title, body and first source from the
/// referenced article.
async fn factcheck(
    State(state): State<AppState>,
    Json(mut req): Json<FactCheckRequest>,
) -> Result<Json<FactCheckResult>, ApiError> {
    let has_title = req.title.as_deref().is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        let id = req
            .article_id
            .clone()
            .ok_or_else(|| ApiError::BadRequest("title or articleId is required".into()))?;
        let stored = state
            .store
            .article_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::BadRequest(format!("article {id} does not exist")))?;
        req.title = Some(stored.title);
        if req.content.is_none() {
            req.content = Some(stored.body);
        }
        if req.source.is_none() {
            req.source = stored.sources.first().map(|s| s.source_name.clone());
        }
    }
    Ok(Json(state.fact_checker.check(&req).await))
}

async fn fetch_sources(State(state): State<AppState>) -> Result<Json<CollectSummary>, ApiError> {
    Ok(Json(state.collector.collect().await?))
}

#[derive(Debug, Deserialize)]
struct InterestBody {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct InterestsOut {
    registered: bool,
    interests: Vec<String>,
}

async fn list_interests(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.interests.names())
}

async fn register_interest(
    State(state): State<AppState>,
    Json(body): Json<InterestBody>,
) -> Result<Json<InterestsOut>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("interest name must not be blank".into()));
    }
    let registered = state.interests.register(&body.name);
    if registered {
        info!(target: "api", interest = %body.name.trim(), "interest registered");
    }
    Ok(Json(InterestsOut {
        registered,
        interests: state.interests.names(),
    }))
}

#[derive(Debug, Deserialize)]
struct InterestSearchBody {
    #[serde(default, alias = "interestName")]
    name: String,
    #[serde(default, alias = "searchPrompt")]
    prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct InterestSearchOut {
    inserted: usize,
    total_discovered: usize,
    interest: String,
}

/// Search one interest right away and store what it finds, without waiting
/// for the next collection pass.
async fn search_interest(
    State(state): State<AppState>,
    Json(body): Json<InterestSearchBody>,
) -> Result<Json<InterestSearchOut>, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("interest name must not be blank".into()));
    }
    if !state.search.is_configured() {
        return Err(ApiError::Unavailable(
            "interest search unavailable: web-search completion is not configured".into(),
        ));
    }

    let query = match body.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(ask) => DiscoveryQuery::new(name, Category::Global, SubCategory::General, ask),
        None => DiscoveryQuery::for_interest(name),
    };
    let provider = WebSearchDiscovery::new(state.search.clone(), query)
        .with_categorizer(state.categorizer.clone(), state.min_confidence);

    let found = match tokio::time::timeout(state.provider_timeout, provider.fetch()).await {
        Ok(Ok(items)) => items,
        Ok(Err(e)) => {
            warn!(target: "api", interest = %name, error = %format!("{e:#}"), "interest search failed");
            return Err(ApiError::Upstream(format!("search failed: {e:#}")));
        }
        Err(_) => {
            warn!(target: "api", interest = %name, "interest search timed out");
            return Err(ApiError::Upstream("search timed out".into()));
        }
    };
    let total_discovered = found.len();
    let inserted = state.store.upsert_raw_sources(&dedupe_by_url(found)).await?;
    info!(target: "api", interest = %name, total_discovered, inserted, "interest searched");

    Ok(Json(InterestSearchOut {
        inserted,
        total_discovered,
        interest: name.to_string(),
    }))
}
