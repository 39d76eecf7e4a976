// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod categorize;
pub mod config;
pub mod dedup;
pub mod factcheck;
pub mod generate;
pub mod ingest;
pub mod interest;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::PipelineConfig;
pub use crate::store::{MemoryStore, Store};

use std::sync::Arc;

use tracing::info;

/// Build the full application state from config: completion collaborators
/// (real, mock or disabled), an in-process store and every provider.
pub fn build_state(cfg: &PipelineConfig) -> anyhow::Result<AppState> {
    let clients = llm::xai::build_clients(&cfg.llm);
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let state = AppState::build(cfg, clients, store)?;
    info!(
        target: "api",
        feeds = cfg.feeds.len(),
        discovery = cfg.discovery.len(),
        interests = state.interests.names().len(),
        "application state ready"
    );
    Ok(state)
}
