//! Bounded LRU cache of word-query results.
//!
//! Entries are keyed by the query word. A cached result is only valid for the
//! request shape it was computed under, so the cache remembers the shape of the
//! last search and empties itself whenever a request arrives with a different one.
//! Mutations of the index clear it outright.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::data::SearchResult;

/// Default number of cached words.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// The request parameters a cached result depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryShape {
    pub top_k: usize,
    /// Discriminant of the search type.
    pub search_type: u8,
    pub filter_edit_distance: Option<usize>,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of search results with shape-aware invalidation.
#[derive(Debug)]
pub struct ResultCache {
    entries: LruCache<String, Arc<SearchResult>>,
    shape: Option<QueryShape>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` words. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            shape: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Get the result for `word`, promoting it to most recently used.
    pub fn get(&mut self, word: &str) -> Option<Arc<SearchResult>> {
        self.entries.get(word).cloned()
    }

    /// Insert or replace the result for `word`, evicting the least recently used entry when full.
    pub fn put(&mut self, word: &str, value: Arc<SearchResult>) {
        self.entries.put(word.to_string(), value);
    }

    /// Drop every entry and forget the last request shape.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.shape = None;
    }

    /// Record `shape` as the current request shape, clearing the cache if it changed.
    pub fn observe(&mut self, shape: QueryShape) {
        if self.shape != Some(shape) {
            if !self.entries.is_empty() {
                tracing::debug!(?shape, "Query shape changed, clearing result cache");
            }
            self.entries.clear();
            self.shape = Some(shape);
        }
    }

    /// Look up `word` under `shape`. A shape change clears the cache and misses.
    pub fn lookup(&mut self, word: &str, shape: QueryShape) -> Option<Arc<SearchResult>> {
        self.observe(shape);
        match self.get(word) {
            Some(hit) => {
                self.hits += 1;
                tracing::debug!(word, "Result cache hit");
                Some(hit)
            }
            None => {
                self.misses += 1;
                tracing::debug!(word, "Result cache miss");
                None
            }
        }
    }

    /// Store `value` for `word` if `shape` is still the current request shape.
    ///
    /// Returns whether the value was stored.
    pub fn store(&mut self, word: &str, shape: QueryShape, value: Arc<SearchResult>) -> bool {
        if self.shape != Some(shape) {
            return false;
        }
        self.put(word, value);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.entries.len(),
            capacity: self.capacity(),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
