//! Stream records, query parameters and the response envelope.
//!
//! The upstream schema has drifted over time, so [`Stream`] is deliberately
//! forgiving: apart from `id`, every field is optional and a malformed value
//! (bad URL, unparseable timestamp, negative count) becomes `None` instead of
//! rejecting the record.  Fields this crate does not know about are kept in
//! [`Stream::extra`] and written back out unchanged.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QueryError;

pub const MIN_LIMIT: u32 = 1;
pub const MAX_LIMIT: u32 = 1000;
pub const DEFAULT_LIMIT: u32 = 20;

// ------------------------------------------------------------------ //
//  Sorting                                                            //
// ------------------------------------------------------------------ //

/// Column the upstream API sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    NumParticipants,
    CreatedAt,
    StartedAt,
    ViewerCount,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::NumParticipants,
        SortKey::CreatedAt,
        SortKey::StartedAt,
        SortKey::ViewerCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::NumParticipants => "num_participants",
            SortKey::CreatedAt       => "created_at",
            SortKey::StartedAt       => "started_at",
            SortKey::ViewerCount     => "viewer_count",
        }
    }

    /// Column heading used by the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            SortKey::NumParticipants => "Viewers",
            SortKey::CreatedAt       => "Created",
            SortKey::StartedAt       => "Started",
            SortKey::ViewerCount     => "Viewer count",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| QueryError::InvalidSortKey(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[default]
    #[serde(rename = "DESC")]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc  => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc  => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ASC") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("DESC") {
            Ok(SortOrder::Desc)
        } else {
            Err(QueryError::InvalidSortOrder(s.to_string()))
        }
    }
}

// ------------------------------------------------------------------ //
//  Queries                                                            //
// ------------------------------------------------------------------ //

/// A fully resolved page request.  Doubles as the cache key for fetched
/// pages, so two equal queries always address the same cached result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamQuery {
    pub limit: u32,
    pub offset: u32,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for StreamQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl StreamQuery {
    /// Query-string pairs in the order the upstream API documents them.
    pub fn to_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
            ("sort_by", self.sort_by.as_str().to_string()),
            ("sort_order", self.sort_order.as_str().to_string()),
        ]
    }
}

/// A partially specified query; unset fields take defaults on
/// [`QueryParams::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
}

impl QueryParams {
    pub fn resolve(&self, default_limit: u32) -> StreamQuery {
        StreamQuery {
            limit: self.limit.unwrap_or(default_limit),
            offset: self.offset.unwrap_or(0),
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
        }
    }
}

impl From<StreamQuery> for QueryParams {
    fn from(q: StreamQuery) -> Self {
        Self {
            limit: Some(q.limit),
            offset: Some(q.offset),
            sort_by: Some(q.sort_by),
            sort_order: Some(q.sort_order),
        }
    }
}

// ------------------------------------------------------------------ //
//  Stream record                                                      //
// ------------------------------------------------------------------ //

/// Broadcast state derived from `is_currently_live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Live,
    Ended,
    Unknown,
}

impl LiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LiveStatus::Live    => "LIVE",
            LiveStatus::Ended   => "ENDED",
            LiveStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One live or ended broadcast as reported by the upstream API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub mint: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    // Media and social links
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub video_uri: Option<String>,
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, deserialize_with = "lenient::url", skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    // Counters
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub num_participants: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub viewer_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub chat_members: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub counts_streams: Option<u64>,

    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub is_currently_live: Option<bool>,
    #[serde(default, deserialize_with = "lenient::flag", skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    // Timestamps
    #[serde(default, deserialize_with = "lenient::timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub created_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub last_trade_timestamp: Option<String>,

    // Market data
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float", skip_serializing_if = "Option::is_none")]
    pub usd_market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub raydium_pool: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,

    /// Fields the upstream sent that are not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

impl Stream {
    /// name → symbol → title → handle → "Unknown".
    pub fn display_name(&self) -> &str {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.symbol))
            .or_else(|| non_empty(&self.title))
            .or_else(|| non_empty(&self.handle))
            .unwrap_or("Unknown")
    }

    /// symbol → handle → name → title → "unknown".
    pub fn handle_label(&self) -> &str {
        non_empty(&self.symbol)
            .or_else(|| non_empty(&self.handle))
            .or_else(|| non_empty(&self.name))
            .or_else(|| non_empty(&self.title))
            .unwrap_or("unknown")
    }

    /// Participant count, falling back to the legacy `viewer_count`.
    pub fn participants(&self) -> u64 {
        self.num_participants.or(self.viewer_count).unwrap_or(0)
    }

    pub fn live_status(&self) -> LiveStatus {
        match self.is_currently_live {
            Some(true)  => LiveStatus::Live,
            Some(false) => LiveStatus::Ended,
            None        => LiveStatus::Unknown,
        }
    }

    /// When the broadcast began; older records only carry `created_at`.
    pub fn started(&self) -> Option<DateTime<Utc>> {
        self.started_at.or(self.created_at)
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail
            .as_deref()
            .or(self.thumbnail_url.as_deref())
            .or(self.image_uri.as_deref())
    }

    /// Link to the token page when the stream is tied to a mint.
    pub fn external_url(&self) -> Option<String> {
        non_empty(&self.mint).map(|mint| format!("https://pump.fun/{mint}"))
    }

    /// Case-insensitive substring match against the display name, title and
    /// handle.  `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        [Some(self.display_name()), non_empty(&self.title), non_empty(&self.handle)]
            .into_iter()
            .flatten()
            .any(|hay| hay.to_lowercase().contains(needle))
    }
}

// ------------------------------------------------------------------ //
//  Pages and envelopes                                                //
// ------------------------------------------------------------------ //

/// Normalised page of results, independent of the envelope it came in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamPage {
    pub items: Vec<Stream>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl StreamPage {
    /// An empty page that still reports the requested position.
    pub fn empty(query: &StreamQuery) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            limit: query.limit,
            offset: query.offset,
        }
    }

    /// Normalise an upstream envelope.  Missing metadata falls back to the
    /// requested position, and a missing total to what has been seen so far.
    pub fn from_envelope(envelope: StreamsEnvelope, query: &StreamQuery) -> Self {
        let meta = envelope.data.metadata.unwrap_or_default();
        let items = envelope.data.data;
        let limit = meta.limit.or(envelope.limit).unwrap_or(query.limit);
        let offset = meta.offset.or(envelope.offset).unwrap_or(query.offset);
        let total = meta
            .total
            .or(envelope.total)
            .unwrap_or(u64::from(offset) + items.len() as u64);
        Self { items, total, limit, offset }
    }

    /// Canonical `{data: {data, metadata}}` shape served by the proxy.
    pub fn into_envelope(self) -> StreamsEnvelope {
        StreamsEnvelope {
            status_code: None,
            data: StreamsData {
                data: self.items,
                metadata: Some(PageMetadata {
                    total: Some(self.total),
                    limit: Some(self.limit),
                    offset: Some(self.offset),
                }),
            },
            total: None,
            limit: None,
            offset: None,
        }
    }
}

/// Wire envelope shared by the upstream API and the proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamsEnvelope {
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i64>,
    pub data: StreamsData,
    // Some upstream revisions report the position at the top level.
    #[serde(default, deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, deserialize_with = "lenient::small_count", skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "lenient::small_count", skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamsData {
    pub data: Vec<Stream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default, deserialize_with = "lenient::count")]
    pub total: Option<u64>,
    #[serde(default, deserialize_with = "lenient::small_count")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "lenient::small_count")]
    pub offset: Option<u32>,
}

// ------------------------------------------------------------------ //
//  Field-level coercion                                               //
// ------------------------------------------------------------------ //

mod lenient {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("invalid stream id: {other}"))),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    pub fn url<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(text(d)?.filter(|s| {
            let s = s.trim();
            !s.is_empty() && reqwest::Url::parse(s).is_ok()
        }))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => Some(b),
            _ => None,
        })
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?
            .as_ref()
            .and_then(to_f64)
            .filter(|f| f.is_finite()))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(to_count))
    }

    pub fn small_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(count(d)?.and_then(|n| u32::try_from(n).ok()))
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(text(d)?.and_then(|s| {
            DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }))
    }

    fn to_f64(v: &Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn to_count(v: &Value) -> Option<u64> {
        if let Value::Number(n) = v {
            if let Some(u) = n.as_u64() {
                return Some(u);
            }
        }
        to_f64(v)
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.trunc() as u64)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(v: Value) -> Stream {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn minimal_record_only_needs_id() {
        let s = parse(json!({ "id": "abc" }));
        assert_eq!(s.id, "abc");
        assert_eq!(s.display_name(), "Unknown");
        assert_eq!(s.handle_label(), "unknown");
        assert_eq!(s.participants(), 0);
        assert_eq!(s.live_status(), LiveStatus::Unknown);
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(serde_json::from_value::<Stream>(json!({ "name": "x" })).is_err());
    }

    #[test]
    fn malformed_sub_fields_become_absent() {
        let s = parse(json!({
            "id": "1",
            "twitter": "not a url",
            "website": "",
            "telegram": "https://t.me/example",
            "created_at": "yesterday",
            "num_participants": -4,
            "chat_members": "12",
            "is_currently_live": "yes",
            "market_cap": "1234.5",
            "usd_market_cap": "n/a"
        }));
        assert_eq!(s.twitter, None);
        assert_eq!(s.website, None);
        assert_eq!(s.telegram.as_deref(), Some("https://t.me/example"));
        assert_eq!(s.created_at, None);
        assert_eq!(s.num_participants, None);
        assert_eq!(s.chat_members, Some(12));
        assert_eq!(s.is_currently_live, None);
        assert_eq!(s.market_cap, Some(1234.5));
        assert_eq!(s.usd_market_cap, None);
    }

    #[test]
    fn unknown_fields_are_kept_and_written_back() {
        let s = parse(json!({ "id": "1", "name": "Alpha", "brand_new_field": { "x": 1 } }));
        assert_eq!(s.extra.get("brand_new_field"), Some(&json!({ "x": 1 })));

        let out = serde_json::to_value(&s).unwrap();
        assert_eq!(out["brand_new_field"], json!({ "x": 1 }));
        assert_eq!(out["name"], "Alpha");
        assert!(out.get("symbol").is_none());
    }

    #[test]
    fn timestamps_parse_as_utc() {
        let s = parse(json!({ "id": "1", "started_at": "2024-05-01T12:00:00+02:00" }));
        assert_eq!(s.started().unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn display_name_fallback_chain_skips_blank_values() {
        let s = Stream {
            id: "1".into(),
            name: Some("  ".into()),
            title: Some("Late night".into()),
            handle: Some("owl".into()),
            ..Default::default()
        };
        assert_eq!(s.display_name(), "Late night");
        assert_eq!(s.handle_label(), "owl");
    }

    #[test]
    fn participants_fall_back_to_viewer_count() {
        let s = Stream { id: "1".into(), viewer_count: Some(7), ..Default::default() };
        assert_eq!(s.participants(), 7);
    }

    #[test]
    fn search_is_case_insensitive_on_name_and_handle() {
        let s = Stream {
            id: "1".into(),
            name: Some("Moon Party".into()),
            handle: Some("DJ_Luna".into()),
            ..Default::default()
        };
        assert!(s.matches_search("moon"));
        assert!(s.matches_search("dj_lu"));
        assert!(!s.matches_search("sun"));
        assert!(s.matches_search(""));
    }

    #[test]
    fn sort_key_round_trips_through_str() {
        for key in SortKey::ALL {
            assert_eq!(key.as_str().parse::<SortKey>().unwrap(), key);
        }
        assert!(matches!(
            "rating".parse::<SortKey>(),
            Err(QueryError::InvalidSortKey(_))
        ));
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
    }

    #[test]
    fn query_params_resolve_defaults() {
        let q = QueryParams::default().resolve(DEFAULT_LIMIT);
        assert_eq!(q, StreamQuery::default());
        assert_eq!(q.sort_by, SortKey::NumParticipants);
        assert_eq!(q.sort_order, SortOrder::Desc);
    }

    #[test]
    fn envelope_metadata_falls_back_to_request() {
        let env: StreamsEnvelope = serde_json::from_value(json!({
            "statusCode": 200,
            "data": { "data": [{ "id": "a" }, { "id": "b" }] }
        }))
        .unwrap();
        let query = StreamQuery { limit: 2, offset: 40, ..Default::default() };
        let page = StreamPage::from_envelope(env, &query);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.limit, 2);
        assert_eq!(page.offset, 40);
        assert_eq!(page.total, 42);
    }

    #[test]
    fn canonical_envelope_shape() {
        let page = StreamPage {
            items: vec![Stream { id: "a".into(), ..Default::default() }],
            total: 9,
            limit: 5,
            offset: 5,
        };
        let out = serde_json::to_value(page.into_envelope()).unwrap();
        assert_eq!(
            out,
            json!({ "data": { "data": [{ "id": "a" }], "metadata": { "total": 9, "limit": 5, "offset": 5 } } })
        );
    }
}
