//! Axum HTTP handlers for the stats proxy.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use streamstats::{fetch_page, FetchOutcome};
use tracing::{error, info, warn};

use crate::{
    models::{ErrorBody, RawStreamQuery, UpstreamErrorBody},
    AppState,
};

/// Headers that stop any intermediate cache from serving a stale page.
const NO_STORE: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

// ------------------------------------------------------------------ //
//  GET /api/streams                                                   //
// ------------------------------------------------------------------ //

/// Validate the query, forward it upstream and reshape the result into the
/// canonical `{data: {data, metadata}}` envelope.
pub async fn get_streams(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let raw = RawStreamQuery::from_pairs(pairs);
    let params = match raw.validate() {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, ?raw, "rejected stream query");
            return (
                StatusCode::BAD_REQUEST,
                NO_STORE,
                Json(ErrorBody { error: e.to_string() }),
            )
                .into_response();
        }
    };

    match fetch_page(state.source.as_ref(), params, state.config.default_page_size).await {
        FetchOutcome::Loaded(page) => {
            info!(
                limit = page.limit,
                offset = page.offset,
                items = page.items.len(),
                "GET /api/streams served"
            );
            (StatusCode::OK, NO_STORE, Json(page.into_envelope())).into_response()
        }
        FetchOutcome::Failed { reason, .. } => {
            error!(reason = %reason, "upstream fetch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                NO_STORE,
                Json(UpstreamErrorBody {
                    error: "Failed to fetch streams data".to_string(),
                    message: reason,
                }),
            )
                .into_response()
        }
    }
}

// ------------------------------------------------------------------ //
//  Health                                                             //
// ------------------------------------------------------------------ //

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
