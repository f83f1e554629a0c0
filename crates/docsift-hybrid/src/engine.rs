use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use docsift_cache::{CacheManager, CacheStatsSnapshot, Computed};
use docsift_core::config::EngineConfig;
use docsift_core::error::Backend;
use docsift_core::traits::{DocumentStore, EmbeddingProvider, LexicalIndex, VectorIndex};
use docsift_core::types::{Document, HitSource, Query, RankedHit, SearchResponse};
use docsift_core::{Error, Result};

use crate::fusion::{merge, FusionParams};
use crate::preprocess::{PreparedQuery, QueryPreprocessor};

/// The external collaborators a search runs against.
#[derive(Clone)]
pub struct Backends {
    pub lexical: Arc<dyn LexicalIndex>,
    pub vector: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn DocumentStore>,
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub lexical: Duration,
    pub vector: Duration,
    pub embed: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { lexical: Duration::from_secs(2), vector: Duration::from_secs(2), embed: Duration::from_secs(2) }
    }
}

/// Everything a cache miss needs, shared with the spawned computation.
struct Pipeline {
    backends: Backends,
    fusion: FusionParams,
    timeouts: Timeouts,
}

pub struct HybridSearchEngine {
    pipeline: Arc<Pipeline>,
    preprocessor: QueryPreprocessor,
    cache: Arc<CacheManager<SearchResponse>>,
}

impl HybridSearchEngine {
    /// Engine with a memory-only result cache sized from `config.cache`.
    pub fn new(backends: Backends, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(CacheManager::new(config.cache.memory_capacity));
        Self::with_cache(backends, config, cache)
    }

    pub fn with_cache(backends: Backends, config: &EngineConfig, cache: Arc<CacheManager<SearchResponse>>) -> Result<Self> {
        config.validate()?;
        if backends.vector.dim() != backends.embedder.dim() {
            return Err(Error::ConfigInvalid(format!(
                "embedder produces {} dims but the vector index expects {}",
                backends.embedder.dim(),
                backends.vector.dim()
            )));
        }
        let search = &config.search;
        let timeouts = Timeouts {
            lexical: Duration::from_millis(search.lexical_timeout_ms),
            vector: Duration::from_millis(search.vector_timeout_ms),
            embed: Duration::from_millis(search.embed_timeout_ms),
        };
        let pipeline = Arc::new(Pipeline { backends, fusion: FusionParams::from(search), timeouts });
        let preprocessor = QueryPreprocessor::from_config(search, &config.query)?;
        Ok(Self { pipeline, preprocessor, cache })
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot { self.cache.stats() }

    /// Wait for background cache writes.
    pub async fn flush_cache(&self) { self.cache.flush().await }

    /// Feed documents to both indexes. Blocking; call off the async runtime.
    pub fn index(&self, docs: &[Document]) -> Result<()> {
        let backends = &self.pipeline.backends;
        let started = Instant::now();
        backends.vector.index(docs)?;
        backends.lexical.index(docs)?;
        info!(docs = docs.len(), elapsed_ms = started.elapsed().as_millis() as u64, "indexes updated");
        Ok(())
    }

    /// Run `query` against both backends, fuse and cache the result.
    ///
    /// Only `InvalidQuery` and `QueryFailed` (both backends down) are returned
    /// as errors; a single failing backend yields `degraded: true`.
    pub async fn hybrid_search(&self, query: &Query) -> Result<SearchResponse> {
        let prepared = self.preprocessor.prepare(query)?;
        let key = prepared.cache_key()?;
        let version = self.pipeline.backends.store.content_version();
        let pipeline = Arc::clone(&self.pipeline);
        let lookup = self
            .cache
            .get_or_compute(&key, version, move || async move { pipeline.run(prepared).await })
            .await?;
        debug!(key = %key, status = ?lookup.status, degraded = lookup.value.degraded, "search served");
        Ok(lookup.value)
    }
}

impl Pipeline {
    async fn run(&self, query: PreparedQuery) -> Result<Computed<SearchResponse>> {
        let started = Instant::now();
        let depth = self.fusion.depth;

        let lexical = {
            let index = Arc::clone(&self.backends.lexical);
            let text = query.lexical.clone();
            let filters = query.filters.clone();
            call_backend(Backend::Lexical, self.timeouts.lexical, move || index.search(&text, &filters, depth))
        };
        let vector = async {
            let embedder = Arc::clone(&self.backends.embedder);
            let text = query.semantic.clone();
            let embedding = call_backend(Backend::Vector, self.timeouts.embed, move || embedder.embed(&text)).await?;
            let index = Arc::clone(&self.backends.vector);
            let filters = query.filters.clone();
            call_backend(Backend::Vector, self.timeouts.vector, move || index.search(&embedding, depth, &filters)).await
        };
        let (lexical, vector) = tokio::join!(lexical, vector);

        let (lexical, vector, survivor) = match (lexical, vector) {
            (Ok(l), Ok(v)) => (l, v, None),
            (Ok(l), Err(e)) => {
                warn!(backend = "vector", error = %e, "degrading to lexical results");
                (l, Vec::new(), Some(HitSource::Lexical))
            }
            (Err(e), Ok(v)) => {
                warn!(backend = "lexical", error = %e, "degrading to vector results");
                (Vec::new(), v, Some(HitSource::Vector))
            }
            (Err(le), Err(ve)) => {
                warn!(lexical = %le, vector = %ve, "both retrieval backends failed");
                return Err(Error::QueryFailed(format!("lexical: {le}; vector: {ve}")));
            }
        };

        let mut hits: Vec<RankedHit> = merge(&lexical, &vector, &self.fusion);
        hits.truncate(query.limit);
        if let Some(source) = survivor {
            for h in &mut hits {
                h.source = source;
            }
        }
        let degraded = survivor.is_some();
        debug!(
            lexical = lexical.len(),
            vector = vector.len(),
            fused = hits.len(),
            degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query computed"
        );
        let response = SearchResponse { hits, degraded };
        Ok(if degraded { Computed::transient(response) } else { Computed::cacheable(response) })
    }
}

/// Run a blocking backend call on the blocking pool under `limit`. Every
/// failure, including a timeout or a panic, is reported as that backend
/// being unavailable.
async fn call_backend<T, F>(backend: Backend, limit: Duration, call: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let unavailable = |reason: String| Error::BackendUnavailable { backend, reason };
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(Error::BackendUnavailable { reason, .. }))) => Err(unavailable(reason)),
        Ok(Ok(Err(e))) => Err(unavailable(e.to_string())),
        Ok(Err(join)) => Err(unavailable(format!("task failed: {join}"))),
        Err(_) => Err(unavailable(format!("timed out after {}ms", limit.as_millis()))),
    }
}
