//! Page fetching with a never-raise contract.
//!
//! [`fetch_page`] resolves defaults, asks a [`StreamSource`] for the page and
//! folds every failure (transport, HTTP status, schema) into
//! [`FetchOutcome::Failed`] after logging it.  Callers that only want the old
//! "empty page on error" behaviour use [`FetchOutcome::into_page`]; callers
//! that need to tell "no streams" from "source unreachable" match on the
//! variant.

use tracing::{error, info};

use crate::model::{QueryParams, StreamPage, StreamQuery};
use crate::source::StreamSource;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Loaded(StreamPage),
    Failed { query: StreamQuery, reason: String },
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }

    pub fn page(&self) -> Option<&StreamPage> {
        match self {
            FetchOutcome::Loaded(page) => Some(page),
            FetchOutcome::Failed { .. } => None,
        }
    }

    /// The loaded page, or an empty page at the requested position.
    pub fn into_page(self) -> StreamPage {
        match self {
            FetchOutcome::Loaded(page) => page,
            FetchOutcome::Failed { query, .. } => StreamPage::empty(&query),
        }
    }
}

/// Fetch one page, filling unset parameters from `default_limit`, offset 0,
/// descending participant count.
pub async fn fetch_page(
    source: &dyn StreamSource,
    params: QueryParams,
    default_limit: u32,
) -> FetchOutcome {
    fetch_query(source, params.resolve(default_limit)).await
}

/// Fetch an already resolved query.
pub async fn fetch_query(source: &dyn StreamSource, query: StreamQuery) -> FetchOutcome {
    match source.fetch(&query).await {
        Ok(page) => {
            info!(
                limit = query.limit,
                offset = query.offset,
                items = page.items.len(),
                total = page.total,
                "stream page loaded"
            );
            FetchOutcome::Loaded(page)
        }
        Err(e) => {
            error!(error = %e, limit = query.limit, offset = query.offset, "error fetching streams");
            FetchOutcome::Failed {
                query,
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SortKey, SortOrder};
    use crate::source::FakeStreamSource;

    #[tokio::test]
    async fn unset_params_take_defaults() {
        let source = FakeStreamSource::with_participants(0..30);
        let outcome = fetch_page(&source, QueryParams::default(), 20).await;

        assert_eq!(outcome.page().map(|p| p.items.len()), Some(20));
        assert_eq!(
            source.calls(),
            vec![StreamQuery {
                limit: 20,
                offset: 0,
                sort_by: SortKey::NumParticipants,
                sort_order: SortOrder::Desc,
            }]
        );
    }

    #[tokio::test]
    async fn failure_is_tagged_and_keeps_position() {
        let source = FakeStreamSource::with_participants(0..30);
        source.set_failing(true);

        let params = QueryParams {
            limit: Some(50),
            offset: Some(100),
            ..Default::default()
        };
        let outcome = fetch_page(&source, params, 20).await;
        assert!(outcome.is_failed());

        let page = outcome.into_page();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.limit, 50);
        assert_eq!(page.offset, 100);
    }

    #[tokio::test]
    async fn genuine_empty_page_is_not_a_failure() {
        let source = FakeStreamSource::with_participants(0..3);
        let params = QueryParams {
            offset: Some(40),
            ..Default::default()
        };
        let outcome = fetch_page(&source, params, 20).await;
        assert!(!outcome.is_failed());
        assert_eq!(outcome.page().map(|p| p.items.len()), Some(0));
    }
}
