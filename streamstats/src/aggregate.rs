//! KPI aggregation.
//!
//! Page-local figures come from [`calculate_kpi_data`].  Totals across the
//! whole dataset come from [`compute_global_aggregates`], which sweeps the
//! source in fixed-size batches (highest participant count first) until it
//! sees a short or empty batch, or until its offset passes the configured
//! safety ceiling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::StatsConfig;
use crate::fetch::{fetch_query, FetchOutcome};
use crate::model::{SortKey, SortOrder, Stream, StreamQuery};
use crate::source::StreamSource;

// ------------------------------------------------------------------ //
//  Types                                                              //
// ------------------------------------------------------------------ //

/// How a sweep ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SweepStatus {
    /// Reached the last page.
    Complete,
    /// Stopped at the safety ceiling; totals cover only what was read.
    Truncated,
    /// A batch failed; totals are zero.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalAggregates {
    pub total_participants: u64,
    pub peak_participants: u64,
    pub streams_counted: u64,
    pub requests: u32,
    pub status: SweepStatus,
}

impl GlobalAggregates {
    fn failed(requests: u32, reason: String) -> Self {
        Self {
            total_participants: 0,
            peak_participants: 0,
            streams_counted: 0,
            requests,
            status: SweepStatus::Failed { reason },
        }
    }
}

/// Count, sum and max over a single page of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageKpis {
    pub total_streams: u64,
    pub total_participants: u64,
    pub peak_participants: u64,
}

/// Figures shown in the dashboard's KPI row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiSnapshot {
    pub total_streams: u64,
    pub total_participants: u64,
    pub peak_participants: u64,
    pub last_updated: DateTime<Utc>,
}

impl KpiSnapshot {
    /// Stream count from the page metadata; participant figures from the
    /// global sweep when one has finished, zero otherwise.
    pub fn combine(
        page_total: u64,
        aggregates: Option<&GlobalAggregates>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            total_streams: page_total,
            total_participants: aggregates.map_or(0, |a| a.total_participants),
            peak_participants: aggregates.map_or(0, |a| a.peak_participants),
            last_updated,
        }
    }
}

// ------------------------------------------------------------------ //
//  Computation                                                        //
// ------------------------------------------------------------------ //

pub fn calculate_kpi_data(items: &[Stream]) -> PageKpis {
    PageKpis {
        total_streams: items.len() as u64,
        total_participants: items
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.participants())),
        peak_participants: items.iter().map(Stream::participants).max().unwrap_or(0),
    }
}

/// Sweep every page of `source` and total the participant counts.
///
/// Termination is checked in this order after each batch: empty batch,
/// short batch, offset past `safety_ceiling`.  Any failed batch discards the
/// partial totals and reports zeros.
pub async fn compute_global_aggregates(
    source: &dyn StreamSource,
    config: &StatsConfig,
) -> GlobalAggregates {
    let batch = config.batch_size.max(1);
    let mut offset: u32 = 0;
    let mut requests: u32 = 0;
    let mut total: u64 = 0;
    let mut peak: u64 = 0;
    let mut counted: u64 = 0;

    let status = loop {
        let query = StreamQuery {
            limit: batch,
            offset,
            sort_by: SortKey::NumParticipants,
            sort_order: SortOrder::Desc,
        };
        requests += 1;

        let page = match fetch_query(source, query).await {
            FetchOutcome::Loaded(page) => page,
            FetchOutcome::Failed { reason, .. } => {
                warn!(offset, requests, reason = %reason, "aggregate sweep aborted");
                return GlobalAggregates::failed(requests, reason);
            }
        };

        if page.items.is_empty() {
            break SweepStatus::Complete;
        }

        let kpis = calculate_kpi_data(&page.items);
        total = total.saturating_add(kpis.total_participants);
        peak = peak.max(kpis.peak_participants);
        counted += kpis.total_streams;

        if page.items.len() < batch as usize {
            break SweepStatus::Complete;
        }

        offset = offset.saturating_add(batch);
        if offset > config.safety_ceiling {
            warn!(
                ceiling = config.safety_ceiling,
                "reached safety limit for KPI calculation"
            );
            break SweepStatus::Truncated;
        }
    };

    info!(
        requests,
        streams = counted,
        total_participants = total,
        peak_participants = peak,
        "aggregate sweep finished"
    );

    GlobalAggregates {
        total_participants: total,
        peak_participants: peak,
        streams_counted: counted,
        requests,
        status,
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //
