use docsift_core::Result;

use crate::entry::CacheEntry;

/// One storage level of the result cache. All tiers are keyed identically.
///
/// `get` reports undecodable entries as `Error::CacheCorruption`; the manager
/// evicts them and treats the lookup as a miss. `put` must publish atomically:
/// a concurrent `get` sees either the old entry, the new one, or nothing.
pub trait CacheTier: Send + Sync {
    fn name(&self) -> &'static str;
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, entry: &CacheEntry) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
