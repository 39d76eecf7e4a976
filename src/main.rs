//! newsdesk: binary entrypoint.
//! Boots the Axum HTTP server with the ingestion, generation and fact-check
//! pipeline behind it.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsdesk::metrics::Metrics;
use newsdesk::{build_state, router, PipelineConfig};

/// Compact tracing logs; `RUST_LOG` overrides the default filter. A
/// subscriber installed by the runtime takes precedence.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsdesk=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PipelineConfig::load_default()?;
    let metrics = Metrics::init(cfg.factcheck.cache_ttl_mins)?;
    let state = build_state(&cfg)?;

    let app = router(state).merge(metrics.router());
    Ok(app.into())
}
