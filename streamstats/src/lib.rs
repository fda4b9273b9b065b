//! Shared stream-statistics types and logic.
//!
//! Used by both the `stats-proxy` HTTP service and the terminal `dashboard`.
//! Everything that talks to the upstream stats API, validates its records or
//! derives numbers from them lives here so the two binaries agree on the
//! wire format.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod model;
pub mod source;

pub use aggregate::{calculate_kpi_data, compute_global_aggregates, GlobalAggregates, KpiSnapshot, SweepStatus};
pub use config::StatsConfig;
pub use error::{ConfigError, FetchError, QueryError};
pub use fetch::{fetch_page, fetch_query, FetchOutcome};
pub use model::{QueryParams, SortKey, SortOrder, Stream, StreamPage, StreamQuery};
pub use source::{FakeStreamSource, HttpStreamSource, StreamSource};
