//! Short-lived in-memory memo keyed by request identity.
//!
//! Entries are never refreshed in place; a caller asks for a value that is
//! still inside the staleness window and refetches otherwise.  Stale entries
//! stay readable through [`TtlCache::get_any`] so a view can keep showing the
//! last result while a refetch is in flight.
//!
//! Capacity is bounded by an LRU list: reading an entry marks it as recently
//! used, and inserting into a full cache evicts the least recently used one.
//!
//! Time comes from `tokio::time::Instant` so paused-clock tests can move it.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry<V> {
    stored_at: Instant,
    value: V,
}

#[derive(Debug)]
pub struct TtlCache<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    stale_after: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq,
{
    pub fn new(stale_after: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stale_after,
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// The value for `key` if it was stored less than `stale_after` ago.
    pub fn get_fresh(&mut self, key: &K, now: Instant) -> Option<&V> {
        let stale_after = self.stale_after;
        self.entries
            .get(key)
            .filter(|e| now.saturating_duration_since(e.stored_at) < stale_after)
            .map(|e| &e.value)
    }

    /// The value for `key` regardless of age.
    pub fn get_any(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Like [`TtlCache::get_fresh`] but leaves the LRU order alone.
    pub fn is_fresh(&self, key: &K, now: Instant) -> bool {
        self.entries
            .peek(key)
            .is_some_and(|e| now.saturating_duration_since(e.stored_at) < self.stale_after)
    }

    /// Store `value` with a new timestamp.  A full cache drops its least
    /// recently used entry.
    pub fn insert(&mut self, key: K, value: V, now: Instant) {
        self.entries.put(key, Entry { stored_at: now, value });
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.pop(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
