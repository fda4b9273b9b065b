//! Request/response models for the proxy's public REST API.

use serde::Serialize;
use streamstats::{QueryError, QueryParams, SortKey, SortOrder};
use streamstats::model::{MAX_LIMIT, MIN_LIMIT};

// ------------------------------------------------------------------ //
//  Inbound (client → proxy)                                           //
// ------------------------------------------------------------------ //

/// Query string of `GET /api/streams`, kept as raw text until validated.
///
/// When a key repeats, the first occurrence wins.  Empty values count as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStreamQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl RawStreamQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut raw = Self::default();
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_str() {
                "limit" => &mut raw.limit,
                "offset" => &mut raw.offset,
                "sort_by" => &mut raw.sort_by,
                "sort_order" => &mut raw.sort_order,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        raw
    }

    /// Check bounds and enums.  Absent fields stay `None` so the fetch layer
    /// applies its defaults.
    pub fn validate(&self) -> Result<QueryParams, QueryError> {
        let limit = match &self.limit {
            Some(s) => {
                let n: i64 = s.trim().parse().map_err(|_| QueryError::InvalidLimit)?;
                if n < i64::from(MIN_LIMIT) || n > i64::from(MAX_LIMIT) {
                    return Err(QueryError::InvalidLimit);
                }
                Some(n as u32)
            }
            None => None,
        };

        let offset = match &self.offset {
            Some(s) => {
                let n: i64 = s.trim().parse().map_err(|_| QueryError::MalformedOffset)?;
                if n < 0 {
                    return Err(QueryError::InvalidOffset);
                }
                Some(u32::try_from(n).map_err(|_| QueryError::MalformedOffset)?)
            }
            None => None,
        };

        let sort_by = self
            .sort_by
            .as_deref()
            .map(str::parse::<SortKey>)
            .transpose()?;
        let sort_order = self
            .sort_order
            .as_deref()
            .map(str::parse::<SortOrder>)
            .transpose()?;

        Ok(QueryParams {
            limit,
            offset,
            sort_by,
            sort_order,
        })
    }
}

// ------------------------------------------------------------------ //
//  Outbound (proxy → client)                                          //
// ------------------------------------------------------------------ //

/// 400 body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// 500 body.
#[derive(Debug, Serialize)]
pub struct UpstreamErrorBody {
    pub error: String,
    pub message: String,
}
