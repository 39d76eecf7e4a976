// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!(
            "ingest_sources_considered_total",
            "Unprocessed sources pulled into ingestion runs."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Source provider fetch/parse errors and timeouts."
        );
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingestion last ran.");
        describe_counter!("articles_generated_total", "Articles persisted.");
        describe_counter!(
            "articles_skipped_total",
            "Groups that produced no article, by reason."
        );
        describe_counter!(
            "generation_errors_total",
            "Groups whose generation failed with an error."
        );
        describe_counter!(
            "factcheck_requests_total",
            "Fact-check requests by resolving path."
        );
        describe_counter!("factcheck_cache_hits_total", "Fact-check cache hits.");
        describe_histogram!(
            "factcheck_duration_ms",
            "Fact-check wall time in milliseconds (cache misses)."
        );
        describe_counter!("categorize_cache_hits_total", "Categorization cache hits.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the fact-check cache TTL.
    pub fn init(cache_ttl_mins: i64) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        ensure_metrics_described();
        gauge!("factcheck_cache_ttl_ms").set((cache_ttl_mins.max(0) * 60_000) as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
