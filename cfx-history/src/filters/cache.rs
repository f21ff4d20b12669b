//! Per-filter memoization of static predicate results

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe map from entity instance (its serial) to the memoized predicate result
///
/// Keys are instance serials rather than ids: two records sharing an id, or the same
/// id in two libraries, are distinct entries. The predicates are pure, so two workers
/// racing on the same entity compute the same value and the second insert is harmless.
#[derive(Debug, Default)]
pub struct FilterCache {
    results: RwLock<HashMap<u64, bool>>,
    hits: AtomicUsize,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `serial`, computing and storing it on a miss
    pub fn get_or_compute(&self, serial: u64, compute: impl FnOnce() -> bool) -> bool {
        if let Some(&cached) = self.results.read().get(&serial) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached;
        }

        let result = compute();
        self.results.write().insert(serial, result);
        result
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of memoized entities
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }

    pub fn clear(&self) {
        self.results.write().clear();
        self.hits.store(0, Ordering::Relaxed);
    }
}
