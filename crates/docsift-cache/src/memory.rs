//! In-process tier: bounded moka cache with least-recently-used eviction.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use docsift_core::Result;

use crate::entry::CacheEntry;
use crate::tier::CacheTier;

pub struct MemoryTier {
    cache: Cache<String, CacheEntry>,
}

impl MemoryTier {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache }
    }

    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str { "memory" }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.cache.get(key))
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.cache.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key);
        Ok(())
    }
}
