// src/ingest/types.rs
use anyhow::Result;

use crate::model::RawSourceItem;

/// Pluggable discovery source. Callers wrap `fetch` in a timeout.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawSourceItem>>;
    fn name(&self) -> &str;
}
