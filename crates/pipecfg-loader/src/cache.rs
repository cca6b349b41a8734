//! Content-addressed cache of loaded configurations using moka
//!
//! Keyed by the hash of the raw document bytes: re-reading an unchanged
//! document skips migration, validation and building.

use std::sync::Arc;

use moka::sync::Cache;
use pipecfg_artifact::ContentHash;

use crate::loader::LoadedConfig;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Loaded configurations by raw-bytes hash
#[derive(Debug, Clone)]
pub struct LoadCache {
    inner: Cache<ContentHash, Arc<LoadedConfig>>,
}

impl LoadCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Get a cached load
    #[inline]
    #[must_use]
    pub fn get(&self, hash: &ContentHash) -> Option<Arc<LoadedConfig>> {
        self.inner.get(hash)
    }

    /// Insert a load
    #[inline]
    pub fn insert(&self, hash: ContentHash, loaded: Arc<LoadedConfig>) {
        self.inner.insert(hash, loaded);
    }

    /// Get or compute a load; failures are not cached
    ///
    /// # Errors
    /// Returns whatever `load` returns
    pub fn try_get_or_insert_with<E, F>(&self, hash: ContentHash, load: F) -> Result<Arc<LoadedConfig>, E>
    where
        F: FnOnce() -> Result<LoadedConfig, E>,
    {
        if let Some(cached) = self.get(&hash) {
            return Ok(cached);
        }
        let loaded = Arc::new(load()?);
        self.insert(hash, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}
