//! Filter, sort and pagination state of the dashboard view.
//!
//! Pure data: nothing here performs I/O.  [`crate::controller`] owns a
//! [`StreamFilters`] and decides when a change needs a fetch.

use streamstats::{SortKey, SortOrder, Stream, StreamQuery};
use streamstats::model::{MAX_LIMIT, MIN_LIMIT};

// ------------------------------------------------------------------ //
//  Filters                                                            //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFilters {
    pub search: String,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

impl StreamFilters {
    pub fn new(page_size: u32) -> Self {
        Self {
            search: String::new(),
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            limit: page_size.clamp(MIN_LIMIT, MAX_LIMIT),
            offset: 0,
        }
    }

    /// Network-relevant part of the filters.  Search is applied locally and
    /// is not part of the request.
    pub fn query(&self) -> StreamQuery {
        StreamQuery {
            limit: self.limit,
            offset: self.offset,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }

    /// 1-based page derived from offset and page size.  Saturates at
    /// `u32::MAX` for offsets taken from hand-edited query strings.
    pub fn current_page(&self) -> u32 {
        (self.offset / self.limit.max(1)).saturating_add(1)
    }

    /// Merge `patch`.  Changing search, sort or page size moves back to the
    /// first page; only an explicit offset moves elsewhere.
    pub fn apply(&mut self, patch: FilterPatch) {
        let resets_position = patch.resets_position();

        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(limit) = patch.limit {
            self.limit = limit.clamp(MIN_LIMIT, MAX_LIMIT);
        }
        if let Some(offset) = patch.offset {
            self.offset = offset;
        }

        if resets_position {
            self.offset = 0;
        }
    }

    /// Query string mirroring the filters (`search`, `sortBy`, `sortOrder`,
    /// `limit`, `offset`).  An empty search is omitted.
    pub fn to_query_string(&self) -> String {
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        if !self.search.is_empty() {
            out.append_pair("search", &self.search);
        }
        out.append_pair("sortBy", self.sort_by.as_str())
            .append_pair("sortOrder", self.sort_order.as_str())
            .append_pair("limit", &self.limit.to_string())
            .append_pair("offset", &self.offset.to_string());
        out.finish()
    }

    /// Rebuild filters from a shared query string.  Unknown keys are ignored
    /// and unparseable values keep their defaults.
    pub fn from_query_string(query: &str, default_page_size: u32) -> Self {
        let mut filters = Self::new(default_page_size);
        let query = query.trim_start_matches('?');

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "search" => filters.search = value.into_owned(),
                "sortBy" => {
                    if let Ok(k) = value.parse() {
                        filters.sort_by = k;
                    }
                }
                "sortOrder" => {
                    if let Ok(o) = value.parse() {
                        filters.sort_order = o;
                    }
                }
                "limit" => {
                    if let Ok(n) = value.parse::<u32>() {
                        if (MIN_LIMIT..=MAX_LIMIT).contains(&n) {
                            filters.limit = n;
                        }
                    }
                }
                "offset" => {
                    if let Ok(n) = value.parse::<u32>() {
                        filters.offset = n;
                    }
                }
                _ => {}
            }
        }
        filters
    }
}

/// Partial update for [`StreamFilters::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl FilterPatch {
    pub fn search(text: impl Into<String>) -> Self {
        Self { search: Some(text.into()), ..Self::default() }
    }

    pub fn sort_by(key: SortKey) -> Self {
        Self { sort_by: Some(key), ..Self::default() }
    }

    pub fn sort_order(order: SortOrder) -> Self {
        Self { sort_order: Some(order), ..Self::default() }
    }

    pub fn limit(limit: u32) -> Self {
        Self { limit: Some(limit), ..Self::default() }
    }

    pub fn offset(offset: u32) -> Self {
        Self { offset: Some(offset), ..Self::default() }
    }

    fn resets_position(&self) -> bool {
        self.search.is_some()
            || self.sort_by.is_some()
            || self.sort_order.is_some()
            || self.limit.is_some()
    }
}

// ------------------------------------------------------------------ //
//  Pagination                                                         //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    /// 1-based index of the first row on this page; 0 when empty.
    pub first_item: u64,
    pub last_item: u64,
    pub total: u64,
}

impl Pagination {
    pub fn new(filters: &StreamFilters, total: u64) -> Self {
        let limit = u64::from(filters.limit.max(1));
        let offset = u64::from(filters.offset);
        let total_pages = u32::try_from(total.div_ceil(limit)).unwrap_or(u32::MAX);
        let current_page = filters.current_page();

        Self {
            current_page,
            total_pages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
            first_item: if total == 0 { 0 } else { (offset + 1).min(total) },
            last_item: (offset + limit).min(total),
            total,
        }
    }

    /// Up to five page numbers around the current page.
    pub fn window(&self) -> Vec<u32> {
        if self.total_pages == 0 {
            return Vec::new();
        }
        let total = i64::from(self.total_pages);
        let start = (total - 4).min(i64::from(self.current_page) - 2).max(1);
        (start..start + total.min(5))
            .filter(|p| *p <= total)
            .map(|p| p as u32)
            .collect()
    }
}

// ------------------------------------------------------------------ //
//  Search                                                             //
// ------------------------------------------------------------------ //

/// Items of an already loaded page whose display name, title or handle
/// contains `search`, ignoring case.
pub fn filter_items<'a>(items: &'a [Stream], search: &str) -> Vec<&'a Stream> {
    let needle = search.trim().to_lowercase();
    items.iter().filter(|s| s.matches_search(&needle)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changing_sort_resets_to_first_page() {
        let mut f = StreamFilters::new(20);
        f.apply(FilterPatch::offset(60));
        assert_eq!(f.current_page(), 4);

        f.apply(FilterPatch::sort_by(SortKey::CreatedAt));
        assert_eq!(f.offset, 0);
        assert_eq!(f.current_page(), 1);
    }

    #[test]
    fn setting_offset_keeps_sort() {
        let mut f = StreamFilters::new(20);
        f.apply(FilterPatch::sort_by(SortKey::StartedAt));
        f.apply(FilterPatch::offset(40));
        assert_eq!(f.sort_by, SortKey::StartedAt);
        assert_eq!(f.offset, 40);
    }

    #[test]
    fn search_and_limit_also_reset_position() {
        let mut f = StreamFilters::new(20);
        f.apply(FilterPatch::offset(40));
        f.apply(FilterPatch::search("abc"));
        assert_eq!(f.offset, 0);

        f.apply(FilterPatch::offset(40));
        f.apply(FilterPatch::limit(50));
        assert_eq!((f.offset, f.limit), (0, 50));
    }

    #[test]
    fn query_string_round_trip() {
        let mut f = StreamFilters::new(20);
        f.apply(FilterPatch {
            search: Some("night owl".into()),
            sort_by: Some(SortKey::CreatedAt),
            sort_order: Some(SortOrder::Asc),
            limit: Some(50),
            ..Default::default()
        });
        f.apply(FilterPatch::offset(100));

        let qs = f.to_query_string();
        assert_eq!(
            qs,
            "search=night+owl&sortBy=created_at&sortOrder=ASC&limit=50&offset=100"
        );
        assert_eq!(StreamFilters::from_query_string(&qs, 20), f);
    }

    #[test]
    fn bad_query_values_fall_back_to_defaults() {
        let f = StreamFilters::from_query_string("?sortBy=rating&limit=0&offset=-3&x=1", 20);
        assert_eq!(f, StreamFilters::new(20));
    }

    #[test]
    fn huge_offset_from_query_string_does_not_overflow() {
        let f = StreamFilters::from_query_string("limit=1&offset=4294967295", 20);
        assert_eq!(f.offset, u32::MAX);
        assert_eq!(f.current_page(), u32::MAX);

        let p = Pagination::new(&f, 10);
        assert_eq!(p.total_pages, 10);
        assert!(p.has_prev);
        assert!(!p.has_next);
        assert_eq!((p.first_item, p.last_item), (10, 10));
        assert_eq!(p.window(), vec![6, 7, 8, 9, 10]);
    }

    #[test]
    fn pagination_bounds() {
        let mut f = StreamFilters::new(20);
        let p = Pagination::new(&f, 45);
        assert_eq!((p.current_page, p.total_pages), (1, 3));
        assert!(p.has_next);
        assert!(!p.has_prev);
        assert_eq!((p.first_item, p.last_item), (1, 20));

        f.apply(FilterPatch::offset(40));
        let p = Pagination::new(&f, 45);
        assert_eq!(p.current_page, 3);
        assert!(!p.has_next);
        assert!(p.has_prev);
        assert_eq!((p.first_item, p.last_item), (41, 45));
    }

    #[test]
    fn empty_total_has_no_pages() {
        let p = Pagination::new(&StreamFilters::new(20), 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
        assert!(p.window().is_empty());
    }

    #[test]
    fn page_window_is_centred_and_clamped() {
        let mut f = StreamFilters::new(10);
        let at = |f: &mut StreamFilters, page: u32| {
            f.apply(FilterPatch::offset((page - 1) * 10));
            Pagination::new(f, 100).window()
        };
        assert_eq!(at(&mut f, 1), vec![1, 2, 3, 4, 5]);
        assert_eq!(at(&mut f, 5), vec![3, 4, 5, 6, 7]);
        assert_eq!(at(&mut f, 10), vec![6, 7, 8, 9, 10]);

        let p = Pagination::new(&StreamFilters::new(10), 25);
        assert_eq!(p.window(), vec![1, 2, 3]);
    }

    #[test]
    fn search_only_filters_loaded_items() {
        let items = vec![
            Stream { id: "1".into(), name: Some("Alpha Show".into()), ..Default::default() },
            Stream { id: "2".into(), handle: Some("BETA".into()), ..Default::default() },
            Stream { id: "3".into(), title: Some("gamma".into()), ..Default::default() },
        ];
        let ids = |v: Vec<&Stream>| v.into_iter().map(|s| s.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(filter_items(&items, "ALPHA")), vec!["1"]);
        assert_eq!(ids(filter_items(&items, "beta")), vec!["2"]);
        assert_eq!(ids(filter_items(&items, "")), vec!["1", "2", "3"]);
        assert!(filter_items(&items, "delta").is_empty());
    }
}
