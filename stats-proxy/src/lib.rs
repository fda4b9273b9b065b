//! Stats proxy: thin HTTP pass-through in front of the upstream stats API.
//!
//! Validates `limit`/`offset`/`sort_by`/`sort_order`, forwards the query
//! upstream and always answers with well-formed JSON:
//!
//! | Status | Body                                                          |
//! |--------|---------------------------------------------------------------|
//! | 200    | `{data: {data: Stream[], metadata: {total, limit, offset}}}`  |
//! | 400    | `{error}`; nothing is sent upstream                           |
//! | 500    | `{error, message}`; upstream unreachable or malformed         |

pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::{routing::get, Router};
use streamstats::{StatsConfig, StreamSource};
use tower_http::trace::TraceLayer;

// ------------------------------------------------------------------ //
//  Shared application state                                           //
// ------------------------------------------------------------------ //

/// Shared state injected into every Axum handler via `State`.
pub struct AppState {
    /// Where validated queries are forwarded.
    pub source: Arc<dyn StreamSource>,
    pub config: StatsConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/streams", get(handlers::get_streams))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
