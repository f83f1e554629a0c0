//! Tiered result cache with single-flight computation.
//!
//! Lookups walk memory, then each persistent tier in order. A hit in a slower
//! tier is copied into the faster ones. On a miss exactly one computation per
//! `(key, content_version)` runs at a time; concurrent callers wait for it and
//! receive the same result. The computation is spawned on the runtime, so it
//! finishes and populates the cache even if every waiting caller goes away.
//! Persistent tiers are written in the background after waiters are released.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

use docsift_core::config::{expand_path, CacheConfig};
use docsift_core::{Error, Result};

use crate::entry::CacheEntry;
use crate::local::LocalDiskTier;
use crate::memory::MemoryTier;
use crate::tier::CacheTier;

/// What a computation hands back. Values with `persist == false` are shared
/// with the waiters of the flight that produced them but never stored.
pub struct Computed<V> {
    pub value: V,
    pub persist: bool,
}

impl<V> Computed<V> {
    pub fn cacheable(value: V) -> Self { Self { value, persist: true } }
    pub fn transient(value: V) -> Self { Self { value, persist: false } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit { tier: &'static str },
    /// This caller started the computation.
    Computed,
    /// This caller waited on a computation started by someone else.
    Joined,
}

#[derive(Debug, Clone)]
pub struct Lookup<V> {
    pub value: V,
    pub status: CacheStatus,
}

#[derive(Debug, Default)]
struct CacheStats {
    memory_hits: AtomicU64,
    persistent_hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    joined: AtomicU64,
    stale_evictions: AtomicU64,
    corrupt_evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub memory_hits: u64,
    pub persistent_hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub joined: u64,
    pub stale_evictions: u64,
    pub corrupt_evictions: u64,
}

type Outcome<V> = Option<Result<V>>;

pub struct CacheManager<V> {
    memory: MemoryTier,
    persistent: Vec<Arc<dyn CacheTier>>,
    inflight: Mutex<HashMap<String, watch::Receiver<Outcome<V>>>>,
    stats: CacheStats,
    pending_writes: AtomicUsize,
    idle: Notify,
}

impl<V> CacheManager<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(memory_capacity: u64) -> Self {
        Self {
            memory: MemoryTier::new(memory_capacity),
            persistent: Vec::new(),
            inflight: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
            pending_writes: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Append a persistent tier; tiers are consulted in insertion order.
    pub fn with_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.persistent.push(tier);
        self
    }

    /// Memory tier plus the local disk tier when `local_dir` is configured.
    /// The shared tier lives with its storage backend and is added by the caller.
    pub fn from_config(cfg: &CacheConfig) -> Result<Self> {
        cfg.validate()?;
        let mut manager = Self::new(cfg.memory_capacity);
        if let Some(dir) = &cfg.local_dir {
            manager = manager.with_tier(Arc::new(LocalDiskTier::open(&expand_path(dir), cfg.local_capacity)?));
        }
        Ok(manager)
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        std::iter::once(self.memory.name()).chain(self.persistent.iter().map(|t| t.name())).collect()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let s = &self.stats;
        CacheStatsSnapshot {
            memory_hits: s.memory_hits.load(Ordering::Relaxed),
            persistent_hits: s.persistent_hits.load(Ordering::Relaxed),
            misses: s.misses.load(Ordering::Relaxed),
            computations: s.computations.load(Ordering::Relaxed),
            joined: s.joined.load(Ordering::Relaxed),
            stale_evictions: s.stale_evictions.load(Ordering::Relaxed),
            corrupt_evictions: s.corrupt_evictions.load(Ordering::Relaxed),
        }
    }

    /// Wait until background tier writes have finished.
    pub async fn flush(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending_writes.load(Ordering::SeqCst) == 0 { return; }
            notified.await;
        }
    }

    pub async fn get_or_compute<F, Fut>(self: &Arc<Self>, key: &str, version: u64, compute: F) -> Result<Lookup<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<V>>> + Send + 'static,
    {
        if let Some(value) = self.lookup_memory(key, version) {
            return Ok(Lookup { value, status: CacheStatus::Hit { tier: "memory" } });
        }
        if let Some((value, tier)) = self.lookup_persistent(key, version).await {
            return Ok(Lookup { value, status: CacheStatus::Hit { tier } });
        }

        let flight_key = format!("{key}@{version}");
        let (mut rx, status) = {
            let mut inflight = self.inflight.lock().map_err(|_| Error::Operation("inflight map poisoned".into()))?;
            if let Some(rx) = inflight.get(&flight_key) {
                self.stats.joined.fetch_add(1, Ordering::Relaxed);
                (rx.clone(), CacheStatus::Joined)
            } else {
                // A flight that completed since our tier walk wrote memory before unregistering.
                if let Some(value) = self.lookup_memory(key, version) {
                    return Ok(Lookup { value, status: CacheStatus::Hit { tier: "memory" } });
                }
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                inflight.insert(flight_key.clone(), rx.clone());
                self.spawn_flight(tx, flight_key, key.to_string(), version, compute);
                (rx, CacheStatus::Computed)
            }
        };

        let outcome = {
            let done = rx.wait_for(Option::is_some).await.map_err(|_| Error::Operation(format!("computation for {key} aborted")))?;
            done.clone()
        };
        match outcome {
            Some(Ok(value)) => Ok(Lookup { value, status }),
            Some(Err(e)) => Err(e),
            None => Err(Error::Operation(format!("computation for {key} produced nothing"))),
        }
    }

    fn spawn_flight<F, Fut>(self: &Arc<Self>, tx: watch::Sender<Outcome<V>>, flight_key: String, key: String, version: u64, compute: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<V>>> + Send + 'static,
    {
        self.stats.computations.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let guard = FlightGuard { manager: Arc::clone(&this), flight_key };
            let mut to_persist = None;
            let outcome = match compute().await {
                Ok(Computed { value, persist }) => {
                    if persist {
                        match serde_json::to_string(&value) {
                            Ok(json) => {
                                let entry = CacheEntry::new(key.clone(), json, version);
                                let _ = this.memory.put(&entry);
                                to_persist = Some(entry);
                            }
                            Err(e) => warn!(key = %key, error = %e, "result not serializable, skipping cache"),
                        }
                    }
                    Ok(value)
                }
                Err(e) => Err(e),
            };
            let to_persist = to_persist.filter(|_| !this.persistent.is_empty());
            if to_persist.is_some() {
                // Counted before waiters wake so a later flush() sees the write.
                this.pending_writes.fetch_add(1, Ordering::SeqCst);
            }
            drop(guard);
            let _ = tx.send(Some(outcome));
            if let Some(entry) = to_persist {
                let tiers = this.persistent.clone();
                this.write_tiers_counted(tiers, entry).await;
            }
        });
    }

    fn lookup_memory(&self, key: &str, version: u64) -> Option<V> {
        let entry = self.memory.get(key).ok().flatten()?;
        match self.validate(&entry, version) {
            Some(value) => {
                self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, tier = "memory", "cache hit");
                Some(value)
            }
            None => {
                let _ = self.memory.remove(key);
                None
            }
        }
    }

    async fn lookup_persistent(self: &Arc<Self>, key: &str, version: u64) -> Option<(V, &'static str)> {
        for (pos, tier) in self.persistent.iter().enumerate() {
            let t = Arc::clone(tier);
            let k = key.to_string();
            let found = match tokio::task::spawn_blocking(move || t.get(&k)).await {
                Ok(Ok(found)) => found,
                Ok(Err(Error::CacheCorruption(reason))) => {
                    warn!(key, tier = tier.name(), %reason, "corrupt cache entry evicted");
                    self.stats.corrupt_evictions.fetch_add(1, Ordering::Relaxed);
                    self.evict(tier, key).await;
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(key, tier = tier.name(), error = %e, "cache tier unavailable");
                    continue;
                }
                Err(e) => {
                    warn!(key, tier = tier.name(), error = %e, "cache lookup task failed");
                    continue;
                }
            };
            let Some(entry) = found else { continue };
            let Some(value) = self.validate(&entry, version) else {
                self.evict(tier, key).await;
                continue;
            };
            self.stats.persistent_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, tier = tier.name(), "cache hit");
            let _ = self.memory.put(&entry);
            let faster: Vec<_> = self.persistent[..pos].to_vec();
            if !faster.is_empty() {
                let this = Arc::clone(self);
                self.pending_writes.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    this.write_tiers_counted(faster, entry).await;
                });
            }
            return Some((value, tier.name()));
        }
        None
    }

    /// Decode an entry if it is current; counts stale and corrupt entries.
    fn validate(&self, entry: &CacheEntry, version: u64) -> Option<V> {
        if !entry.is_current(version) {
            debug!(key = %entry.key, stored = entry.content_version, current = version, "stale cache entry");
            self.stats.stale_evictions.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        match serde_json::from_str(&entry.value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %entry.key, error = %e, "corrupt cache entry evicted");
                self.stats.corrupt_evictions.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn evict(&self, tier: &Arc<dyn CacheTier>, key: &str) {
        let t = Arc::clone(tier);
        let k = key.to_string();
        if let Ok(Err(e)) = tokio::task::spawn_blocking(move || t.remove(&k)).await {
            warn!(key, tier = tier.name(), error = %e, "cache eviction failed");
        }
    }

    /// Caller has already incremented `pending_writes`.
    async fn write_tiers_counted(&self, tiers: Vec<Arc<dyn CacheTier>>, entry: CacheEntry) {
        let entry = Arc::new(entry);
        for tier in tiers {
            let t = Arc::clone(&tier);
            let e = Arc::clone(&entry);
            match tokio::task::spawn_blocking(move || t.put(&e)).await {
                Ok(Ok(())) => debug!(key = %entry.key, tier = tier.name(), "cache populated"),
                Ok(Err(err)) => warn!(key = %entry.key, tier = tier.name(), error = %err, "cache write failed"),
                Err(err) => warn!(key = %entry.key, tier = tier.name(), error = %err, "cache write task failed"),
            }
        }
        if self.pending_writes.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Unregisters a flight when its task finishes or unwinds.
struct FlightGuard<V> {
    manager: Arc<CacheManager<V>>,
    flight_key: String,
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        if let Ok(mut inflight) = self.manager.inflight.lock() {
            inflight.remove(&self.flight_key);
        }
    }
}
