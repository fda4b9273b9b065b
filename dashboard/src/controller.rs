//! View-state controller.
//!
//! Owns the filters, the page cache and the latest KPI sweep.  It never
//! performs I/O itself: `request_*` decides whether a fetch is needed and
//! marks it in flight, the caller runs it, and `apply_*` folds the result
//! back in.  Results for a query that is no longer current are cached but
//! not shown.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use streamstats::cache::TtlCache;
use streamstats::{
    compute_global_aggregates, fetch_query, FetchOutcome, GlobalAggregates, KpiSnapshot,
    SortKey, SortOrder, StatsConfig, Stream, StreamPage, StreamQuery, StreamSource, SweepStatus,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::view::{filter_items, FilterPatch, Pagination, StreamFilters};

/// Pages kept around for quick back-navigation.
const PAGE_CACHE_ENTRIES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed { reason: String },
}

pub struct ViewController {
    config: StatsConfig,
    filters: StreamFilters,
    pages: TtlCache<StreamQuery, StreamPage>,
    in_flight: HashSet<StreamQuery>,
    current: Option<StreamPage>,
    state: LoadState,
    last_updated: Option<DateTime<Utc>>,

    aggregates: Option<GlobalAggregates>,
    aggregates_at: Option<Instant>,
    /// Wall-clock time the last sweep finished, successful or not.
    aggregates_updated: Option<DateTime<Utc>>,
    sweep_in_flight: bool,

    polling: bool,
    countdown: u64,
}

impl ViewController {
    pub fn new(config: StatsConfig) -> Self {
        Self::with_filters(StreamFilters::new(config.default_page_size), config)
    }

    pub fn with_filters(filters: StreamFilters, config: StatsConfig) -> Self {
        Self {
            pages: TtlCache::new(config.page_stale_after(), PAGE_CACHE_ENTRIES),
            countdown: config.poll_interval_secs,
            filters,
            config,
            in_flight: HashSet::new(),
            current: None,
            state: LoadState::Idle,
            last_updated: None,
            aggregates: None,
            aggregates_at: None,
            aggregates_updated: None,
            sweep_in_flight: false,
            polling: false,
        }
    }

    // -------------------------------------------------------------- //
    //  Accessors                                                      //
    // -------------------------------------------------------------- //

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn filters(&self) -> &StreamFilters {
        &self.filters
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn current_page(&self) -> Option<&StreamPage> {
        self.current.as_ref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn aggregates(&self) -> Option<&GlobalAggregates> {
        self.aggregates.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn countdown(&self) -> u64 {
        self.countdown
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    // -------------------------------------------------------------- //
    //  Navigation                                                     //
    // -------------------------------------------------------------- //

    /// Merge `patch` into the filters.  Returns `true` when the network query
    /// changed.
    pub fn set_filters(&mut self, patch: FilterPatch) -> bool {
        let before = self.filters.query();
        self.filters.apply(patch);
        self.filters.query() != before
    }

    /// Jump to 1-based `page`.  Pages past the known last page are ignored.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if page == 0 {
            return false;
        }
        let total_pages = self.pagination().total_pages;
        if self.current.is_some() && page > total_pages.max(1) {
            return false;
        }
        let offset = (page - 1).saturating_mul(self.filters.limit);
        self.set_filters(FilterPatch::offset(offset))
    }

    pub fn next_page(&mut self) -> bool {
        let p = self.pagination();
        p.has_next && self.go_to_page(p.current_page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        let p = self.pagination();
        p.has_prev && self.go_to_page(p.current_page - 1)
    }

    /// Clicking the active column flips the order; any other column sorts
    /// descending.
    pub fn toggle_sort(&mut self, key: SortKey) -> bool {
        let patch = if key == self.filters.sort_by {
            FilterPatch::sort_order(self.filters.sort_order.flipped())
        } else {
            FilterPatch {
                sort_by: Some(key),
                sort_order: Some(SortOrder::Desc),
                ..FilterPatch::default()
            }
        };
        self.set_filters(patch)
    }

    // -------------------------------------------------------------- //
    //  Page loading                                                   //
    // -------------------------------------------------------------- //

    /// Decide whether the current query needs a fetch.
    ///
    /// A fresh cached page is shown immediately unless `force` is set.  A
    /// query that is already in flight is never requested twice.  Returns the
    /// query the caller must fetch, if any.
    pub fn request_page(&mut self, force: bool, now: Instant) -> Option<StreamQuery> {
        let query = self.filters.query();

        if !force {
            if let Some(page) = self.pages.get_fresh(&query, now) {
                debug!(offset = query.offset, "page served from cache");
                self.current = Some(page.clone());
                self.state = LoadState::Loaded;
                return None;
            }
        }

        // a stale copy stays on screen while the refetch runs
        match self.pages.get_any(&query) {
            Some(page) => {
                self.current = Some(page.clone());
                self.state = LoadState::Loaded;
            }
            None => self.state = LoadState::Loading,
        }
        self.in_flight.insert(query).then_some(query)
    }

    /// Fold a finished fetch back in.  Returns `true` when it became the
    /// visible page (or error).
    pub fn apply_page(
        &mut self,
        query: StreamQuery,
        outcome: FetchOutcome,
        now: Instant,
        wall_now: DateTime<Utc>,
    ) -> bool {
        self.in_flight.remove(&query);
        let is_current = query == self.filters.query();

        match outcome {
            FetchOutcome::Loaded(page) => {
                self.pages.insert(query, page.clone(), now);
                if !is_current {
                    debug!(offset = query.offset, "discarding result for a stale query");
                    return false;
                }
                self.current = Some(page);
                self.state = LoadState::Loaded;
                self.last_updated = Some(wall_now);
                true
            }
            FetchOutcome::Failed { reason, .. } => {
                if !is_current {
                    return false;
                }
                self.state = LoadState::Failed { reason };
                true
            }
        }
    }

    // -------------------------------------------------------------- //
    //  Global KPI sweep                                               //
    // -------------------------------------------------------------- //

    pub fn aggregates_fresh(&self, now: Instant) -> bool {
        self.aggregates_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.aggregate_stale_after())
    }

    /// `true` when the caller should start a sweep.  At most one runs at a
    /// time and a completed sweep is reused until it goes stale.
    pub fn request_aggregates(&mut self, now: Instant) -> bool {
        if self.sweep_in_flight || self.aggregates_fresh(now) {
            return false;
        }
        self.sweep_in_flight = true;
        true
    }

    /// Store a finished sweep.  Failed sweeps show zeros but are not cached,
    /// so the next poll tries again.
    pub fn apply_aggregates(
        &mut self,
        aggregates: GlobalAggregates,
        now: Instant,
        wall_now: DateTime<Utc>,
    ) {
        self.sweep_in_flight = false;
        self.aggregates_updated = Some(wall_now);
        if matches!(aggregates.status, SweepStatus::Failed { .. }) {
            warn!("KPI sweep failed; showing zeros");
        } else {
            self.aggregates_at = Some(now);
        }
        self.aggregates = Some(aggregates);
    }

    // -------------------------------------------------------------- //
    //  Derived view                                                   //
    // -------------------------------------------------------------- //

    /// Rows of the loaded page that pass the search box.
    pub fn visible_streams(&self) -> Vec<&Stream> {
        match &self.current {
            Some(page) => filter_items(&page.items, &self.filters.search),
            None => Vec::new(),
        }
    }

    pub fn pagination(&self) -> Pagination {
        let total = self.current.as_ref().map_or(0, |p| p.total);
        Pagination::new(&self.filters, total)
    }

    /// KPI row.  `last_updated` is when the sweep last finished; before the
    /// first sweep it falls back to the page load time.
    pub fn kpis(&self, wall_now: DateTime<Utc>) -> KpiSnapshot {
        KpiSnapshot::combine(
            self.current.as_ref().map_or(0, |p| p.total),
            self.aggregates.as_ref(),
            self.aggregates_updated
                .or(self.last_updated)
                .unwrap_or(wall_now),
        )
    }

    // -------------------------------------------------------------- //
    //  Polling                                                        //
    // -------------------------------------------------------------- //

    pub fn set_polling(&mut self, enabled: bool) {
        if enabled != self.polling {
            info!(enabled, "auto refresh toggled");
        }
        self.polling = enabled;
        self.countdown = self.config.poll_interval_secs;
    }

    pub fn set_countdown(&mut self, seconds: u64) {
        self.countdown = seconds;
    }

    // -------------------------------------------------------------- //
    //  Inline fetch helpers                                           //
    // -------------------------------------------------------------- //

    /// Request, fetch and apply the current page in one step.
    pub async fn refresh(&mut self, source: &dyn StreamSource, force: bool) -> bool {
        let Some(query) = self.request_page(force, Instant::now()) else {
            return false;
        };
        let outcome = fetch_query(source, query).await;
        self.apply_page(query, outcome, Instant::now(), Utc::now())
    }

    /// Run a sweep now if the cached one is missing or stale.
    pub async fn refresh_aggregates(&mut self, source: &dyn StreamSource) -> bool {
        if !self.request_aggregates(Instant::now()) {
            return false;
        }
        let aggregates = compute_global_aggregates(source, &self.config).await;
        self.apply_aggregates(aggregates, Instant::now(), Utc::now());
        true
    }
}
