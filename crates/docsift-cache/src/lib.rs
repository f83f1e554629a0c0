//! Three-tier result cache: process memory, a local directory and a shared
//! table, all keyed by request fingerprint and stamped with a corpus version.

pub mod entry;
pub mod local;
pub mod manager;
pub mod memory;
pub mod tier;

pub use entry::{fingerprint, CacheEntry};
pub use local::LocalDiskTier;
pub use manager::{CacheManager, CacheStatsSnapshot, CacheStatus, Computed, Lookup};
pub use memory::MemoryTier;
pub use tier::CacheTier;
