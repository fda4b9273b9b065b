//! Stats proxy entry point.
//!
//! # Environment variables
//! | Var                    | Default                    |
//! |------------------------|----------------------------|
//! | `STATS_PROXY_ADDR`     | `0.0.0.0:3000`             |
//! | `STREAMSTATS_BASE_URL` | `https://api.pulstream.so` |
//!
//! See `streamstats::config` for the remaining `STREAMSTATS_*` settings.

use std::sync::Arc;

use anyhow::Result;
use streamstats::{HttpStreamSource, StatsConfig};
use tracing::info;

use stats_proxy::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stats_proxy=info".parse()?)
                .add_directive("streamstats=info".parse()?),
        )
        .json()
        .init();

    let config = StatsConfig::from_env()?;
    let upstream = HttpStreamSource::upstream(&config)?;
    info!(upstream = upstream.endpoint(), "forwarding to upstream stats API");

    let state = Arc::new(AppState {
        source: Arc::new(upstream),
        config,
    });

    let bind_addr =
        std::env::var("STATS_PROXY_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = bind_addr, "stats-proxy listening");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
