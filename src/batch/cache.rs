//! Bounded cache of analysis results keyed by crash log path.

use crate::models::CrashLogAnalysisResult;
use camino::{Utf8Path, Utf8PathBuf};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock};

/// LRU cache shared by all batch workers.
///
/// Lookups take the shared read lock and do not touch recency; inserts and
/// trims take the write lock for the whole read-modify-write.
#[derive(Debug)]
pub struct ResultCache {
    entries: Option<RwLock<LruCache<Utf8PathBuf, Arc<CrashLogAnalysisResult>>>>,
}

impl ResultCache {
    /// A capacity of 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| RwLock::new(LruCache::new(cap))),
        }
    }

    pub fn disabled() -> Self {
        Self { entries: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, path: &Utf8Path) -> Option<Arc<CrashLogAnalysisResult>> {
        let entries = self.entries.as_ref()?;
        let cache = entries.read().unwrap_or_else(PoisonError::into_inner);
        cache.peek(path).cloned()
    }

    pub fn put(&self, path: Utf8PathBuf, result: Arc<CrashLogAnalysisResult>) {
        if let Some(entries) = &self.entries {
            entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .put(path, result);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| {
            entries.read().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop least recently inserted entries until at most `keep` remain.
    ///
    /// Returns how many entries were evicted.
    pub fn trim(&self, keep: usize) -> usize {
        let Some(entries) = &self.entries else {
            return 0;
        };
        let mut cache = entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut evicted = 0;
        while cache.len() > keep {
            if cache.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!("Trimmed {} cached results", evicted);
        }
        evicted
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::disabled()
    }
}
