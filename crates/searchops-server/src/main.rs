//! searchops — control plane and evaluation harness for a document-search index.

use std::sync::Arc;

use searchops_core::AppConfig;
use searchops_engine::HttpEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod slowlog;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    let port = config.port;
    info!(
        "engine at {}, reports under {}",
        config.engine_url,
        config.reports.base.display()
    );

    let engine = Arc::new(HttpEngine::new(config.engine_url.clone()));
    let state = Arc::new(AppState::new(config, engine));

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("searchops listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
