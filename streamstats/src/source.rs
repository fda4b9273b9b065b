//! `StreamSource` trait and implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::debug;

use crate::config::StatsConfig;
use crate::error::FetchError;
use crate::model::{SortKey, SortOrder, Stream, StreamPage, StreamQuery, StreamsEnvelope};

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

/// Anything that can serve one page of stream records.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn fetch(&self, query: &StreamQuery) -> Result<StreamPage, FetchError>;
}

// ------------------------------------------------------------------ //
//  HttpStreamSource (production)                                      //
// ------------------------------------------------------------------ //

/// Reads pages over HTTP from either the upstream stats API or the local
/// proxy.  Both speak the same `{data: {data, metadata}}` envelope.
#[derive(Debug, Clone)]
pub struct HttpStreamSource {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpStreamSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    /// `GET {base_url}/streamstats` on the upstream API.
    pub fn upstream(config: &StatsConfig) -> Result<Self, FetchError> {
        let endpoint = format!("{}/streamstats", config.base_url.trim_end_matches('/'));
        Self::new(endpoint, config.request_timeout())
    }

    /// `GET {proxy_base}/api/streams` on a running `stats-proxy`.
    pub fn proxy(proxy_base: &str, config: &StatsConfig) -> Result<Self, FetchError> {
        let endpoint = format!("{}/api/streams", proxy_base.trim_end_matches('/'));
        Self::new(endpoint, config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn fetch(&self, query: &StreamQuery) -> Result<StreamPage, FetchError> {
        debug!(endpoint = %self.endpoint, ?query, "fetching stream page");

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&query.to_pairs())
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = resp.bytes().await?;
        let envelope: StreamsEnvelope = serde_json::from_slice(&body)?;
        Ok(StreamPage::from_envelope(envelope, query))
    }
}

// ------------------------------------------------------------------ //
//  FakeStreamSource (for tests)                                       //
// ------------------------------------------------------------------ //

/// In-memory paginated source that records every query it serves.
///
/// Cloning shares the dataset, the call log and the failure switch, so a
/// test can keep a handle while the component under test owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeStreamSource {
    items: Arc<Vec<Stream>>,
    reported_total: Option<u64>,
    unbounded: bool,
    latency: Option<Duration>,
    failing: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<StreamQuery>>>,
}

impl FakeStreamSource {
    pub fn new(items: Vec<Stream>) -> Self {
        Self {
            items: Arc::new(items),
            ..Self::default()
        }
    }

    /// One stream per count, named `Stream {i}` with id `stream-{i}`.
    pub fn with_participants(counts: impl IntoIterator<Item = u64>) -> Self {
        let items = counts
            .into_iter()
            .enumerate()
            .map(|(i, n)| Stream {
                id: format!("stream-{i}"),
                name: Some(format!("Stream {i}")),
                handle: Some(format!("host{i}")),
                num_participants: Some(n),
                is_currently_live: Some(true),
                ..Default::default()
            })
            .collect();
        Self::new(items)
    }

    /// A source that always returns full pages, however far the caller
    /// pages, and claims an enormous total.
    pub fn unbounded() -> Self {
        Self {
            unbounded: true,
            reported_total: Some(u64::MAX),
            ..Self::default()
        }
    }

    /// Report `total` in page metadata instead of the dataset length.
    pub fn reporting_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every query served so far, in arrival order.
    pub fn calls(&self) -> Vec<StreamQuery> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn sorted(&self, sort_by: SortKey, order: SortOrder) -> Vec<Stream> {
        let mut items = self.items.as_ref().clone();
        match sort_by {
            SortKey::NumParticipants | SortKey::ViewerCount => {
                items.sort_by_key(|s| s.participants())
            }
            SortKey::CreatedAt => items.sort_by_key(|s| s.created_at),
            SortKey::StartedAt => items.sort_by_key(|s| s.started()),
        }
        if order == SortOrder::Desc {
            items.reverse();
        }
        items
    }
}

#[async_trait]
impl StreamSource for FakeStreamSource {
    async fn fetch(&self, query: &StreamQuery) -> Result<StreamPage, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*query);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Source("fake source is failing".into()));
        }

        let items: Vec<Stream> = if self.unbounded {
            (0..query.limit)
                .map(|i| Stream {
                    id: format!("stream-{}", u64::from(query.offset) + u64::from(i)),
                    num_participants: Some(1),
                    ..Default::default()
                })
                .collect()
        } else {
            self.sorted(query.sort_by, query.sort_order)
                .into_iter()
                .skip(query.offset as usize)
                .take(query.limit as usize)
                .collect()
        };

        Ok(StreamPage {
            items,
            total: self.reported_total.unwrap_or(self.items.len() as u64),
            limit: query.limit,
            offset: query.offset,
        })
    }
}
