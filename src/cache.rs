//! Fixpoint cache: memoized callee summaries.
//!
//! Entries are keyed by `(call site, callee)` and hold the summary computed
//! the last time the callee was analyzed from that call site: the entry
//! value it was seeded with and the resulting exit value. A summary is only
//! reused when the current entry value equals the stored one; otherwise the
//! lookup is a miss and the caller recomputes (and replaces) it.
//!
//! The table is protected by a mutex held only during a single lookup,
//! store or erase. Summaries are immutable once published.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::lattice::Lattice;
use crate::types::{CallId, FunctionId};

/// Summary of one callee analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary<D> {
    /// Value at the callee entry (after parameter binding).
    pub entry: D,
    /// Join of the values at the callee exits.
    pub exit: D,
}

/// Hit/miss counters of a [`FixpointCache`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Table<D> {
    map: HashMap<(CallId, FunctionId), Arc<Summary<D>>>,
    hits: usize,
    misses: usize,
}

/// Thread-safe cache of callee summaries.
#[derive(Debug)]
pub struct FixpointCache<D> {
    table: Mutex<Table<D>>,
}

impl<D> Default for FixpointCache<D> {
    fn default() -> Self {
        Self {
            table: Mutex::new(Table {
                map: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }
}

impl<D: Lattice> FixpointCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the summary for `(call, callee)` computed from `entry`.
    ///
    /// Returns `None` (a miss) if there is no entry or if it was computed
    /// from a different entry value.
    pub fn fetch(&self, call: CallId, callee: FunctionId, entry: &D) -> Option<Arc<Summary<D>>> {
        let mut table = self.table.lock();
        let found = match table.map.get(&(call, callee)) {
            Some(summary) if summary.entry.equals(entry) => Some(Arc::clone(summary)),
            _ => None,
        };
        if found.is_some() {
            table.hits += 1;
        } else {
            table.misses += 1;
        }
        found
    }

    /// Stored summary for `(call, callee)`, whatever entry value it was computed from.
    pub fn get(&self, call: CallId, callee: FunctionId) -> Option<Arc<Summary<D>>> {
        self.table.lock().map.get(&(call, callee)).cloned()
    }

    /// Publish a summary, replacing any previous one for the same key.
    pub fn store(&self, call: CallId, callee: FunctionId, entry: D, exit: D) -> Arc<Summary<D>> {
        let summary = Arc::new(Summary { entry, exit });
        self.table.lock().map.insert((call, callee), Arc::clone(&summary));
        summary
    }

    /// Invalidate the entry for `(call, callee)`. Returns whether one existed.
    pub fn erase(&self, call: CallId, callee: FunctionId) -> bool {
        self.table.lock().map.remove(&(call, callee)).is_some()
    }

    pub fn clear(&self) {
        self.table.lock().map.clear();
    }

    pub fn len(&self) -> usize {
        self.table.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.table.lock().hits
    }

    pub fn misses(&self) -> usize {
        self.table.lock().misses
    }

    pub fn stats(&self) -> CacheStats {
        let table = self.table.lock();
        CacheStats {
            hits: table.hits,
            misses: table.misses,
            entries: table.map.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    const CALL: CallId = CallId(1);
    const CALLEE: FunctionId = FunctionId(2);

    #[test]
    fn test_hit_requires_same_entry() {
        let cache = FixpointCache::new();
        assert!(cache.fetch(CALL, CALLEE, &Interval::finite(0, 1)).is_none());
        cache.store(CALL, CALLEE, Interval::finite(0, 1), Interval::finite(1, 2));

        let hit = cache.fetch(CALL, CALLEE, &Interval::finite(0, 1)).unwrap();
        assert_eq!(hit.exit, Interval::finite(1, 2));
        assert!(cache.fetch(CALL, CALLEE, &Interval::finite(0, 5)).is_none());
        assert!(cache.fetch(CallId(9), CALLEE, &Interval::finite(0, 1)).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_erase_then_miss() {
        let cache = FixpointCache::new();
        cache.store(CALL, CALLEE, Interval::singleton(3), Interval::singleton(4));
        assert!(cache.fetch(CALL, CALLEE, &Interval::singleton(3)).is_some());
        assert!(cache.erase(CALL, CALLEE));
        assert!(!cache.erase(CALL, CALLEE));
        assert!(cache.fetch(CALL, CALLEE, &Interval::singleton(3)).is_none());
        assert_eq!(cache.misses(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_replaces() {
        let cache = FixpointCache::new();
        cache.store(CALL, CALLEE, Interval::singleton(0), Interval::singleton(0));
        cache.store(CALL, CALLEE, Interval::singleton(1), Interval::singleton(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(CALL, CALLEE).unwrap().entry, Interval::singleton(1));
        assert!(cache.fetch(CALL, CALLEE, &Interval::singleton(0)).is_none());
    }
}
