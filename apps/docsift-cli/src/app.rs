//! Wiring between configuration, the on-disk indexes and the engine crates.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use docsift_analysis::{ClusterEngine, ClusterParams, DuplicateDetector};
use docsift_cache::CacheManager;
use docsift_core::config::{resolve_with_base, EngineConfig};
use docsift_core::corpus::CorpusLoader;
use docsift_core::store::InMemoryDocumentStore;
use docsift_core::traits::{DocumentStore, EmbeddingProvider, LexicalIndex};
use docsift_core::types::{Cluster, Document, DuplicateGroup, Query, SearchResponse};
use docsift_embed::default_embedder;
use docsift_hybrid::{Backends, HybridSearchEngine};
use docsift_text::TantivyLexicalIndex;
use docsift_vector::{LanceSharedTier, LanceVectorIndex};

const UPSERT_BATCH: usize = 500;

#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub lexical_docs: u64,
    pub vector_rows: usize,
}

/// Relative paths in the configuration resolve against `base`, the config directory.
pub struct App {
    config: EngineConfig,
    base: PathBuf,
}

impl App {
    pub fn new(config: EngineConfig, base: &Path) -> Self { Self { config, base: base.to_path_buf() } }

    fn path(&self, p: &str) -> PathBuf { resolve_with_base(&self.base, p) }

    pub fn config(&self) -> &EngineConfig { &self.config }

    fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::from(default_embedder(self.config.index.dim))
    }

    fn corpus_path(&self, corpus: Option<&Path>) -> PathBuf {
        corpus.map(Path::to_path_buf).unwrap_or_else(|| self.path(&self.config.data.corpus))
    }

    fn load_documents(&self, corpus: Option<&Path>, limit: Option<usize>) -> Result<Vec<Document>> {
        let path = self.corpus_path(corpus);
        let loader = limit.map_or_else(CorpusLoader::new, CorpusLoader::with_limit);
        let records = loader.load(&path).with_context(|| format!("loading corpus from {}", path.display()))?;
        let embedder = self.embedder();
        loader.into_documents(records, Some(embedder.as_ref()))
    }

    fn load_store(&self) -> Result<Arc<InMemoryDocumentStore>> {
        Ok(Arc::new(InMemoryDocumentStore::from_documents(self.load_documents(None, None)?)))
    }

    async fn open_vector(&self) -> Result<Arc<LanceVectorIndex>> {
        let uri = self.path(&self.config.index.lancedb_dir);
        let index = LanceVectorIndex::open(&uri.to_string_lossy(), &self.config.index.table, self.config.index.dim).await?;
        Ok(Arc::new(index))
    }

    pub async fn index(&self, corpus: Option<&Path>, limit: Option<usize>, fresh: bool) -> Result<IndexReport> {
        let docs = self.load_documents(corpus, limit)?;

        let tantivy_dir = self.path(&self.config.index.tantivy_dir);
        let lexical = TantivyLexicalIndex::create_in_dir(&tantivy_dir)?;
        lexical.index(&docs)?;
        info!(dir = %tantivy_dir.display(), docs = lexical.num_docs(), "lexical index built");

        let lancedb_dir = self.path(&self.config.index.lancedb_dir);
        if fresh && lancedb_dir.exists() {
            std::fs::remove_dir_all(&lancedb_dir)?;
        }
        std::fs::create_dir_all(&lancedb_dir)?;
        let vector = self.open_vector().await?;
        let pb = ProgressBar::new(docs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        for chunk in docs.chunks(UPSERT_BATCH) {
            vector.upsert_async(chunk).await?;
            pb.inc(chunk.len() as u64);
        }
        pb.finish_with_message("vector index updated");

        Ok(IndexReport { documents: docs.len(), lexical_docs: lexical.num_docs(), vector_rows: vector.count_async().await? })
    }

    pub async fn search(&self, query: Query) -> Result<SearchResponse> {
        let mut cache_config = self.config.cache.clone();
        cache_config.local_dir = cache_config.local_dir.map(|d| self.path(&d).to_string_lossy().into_owned());
        let store = self.load_store()?;
        let lexical = TantivyLexicalIndex::open_in_dir(&self.path(&self.config.index.tantivy_dir))
            .context("opening lexical index; run `docsift index` first")?;
        let vector = self.open_vector().await?;

        let mut cache = CacheManager::<SearchResponse>::from_config(&cache_config)?;
        if let Some(uri) = &self.config.cache.shared_uri {
            let uri = self.path(uri);
            let shared = LanceSharedTier::open(&uri.to_string_lossy(), &self.config.cache.shared_table, self.config.cache.shared_capacity).await?;
            cache = cache.with_tier(Arc::new(shared));
        }
        info!(tiers = ?cache.tier_names(), "result cache ready");

        let backends = Backends { lexical: Arc::new(lexical), vector, embedder: self.embedder(), store };
        let engine = HybridSearchEngine::with_cache(backends, &self.config, Arc::new(cache))?;
        let response = engine.hybrid_search(&query).await?;
        engine.flush_cache().await;
        Ok(response)
    }

    pub async fn duplicates(&self, ids: Option<Vec<String>>, threshold: Option<f32>) -> Result<Vec<DuplicateGroup>> {
        let mut dedup = self.config.dedup;
        if let Some(t) = threshold {
            dedup.threshold = t;
        }
        let detector = DuplicateDetector::new(dedup)?;
        let store = self.load_store()?;
        let vector = self.open_vector().await?;
        let groups = tokio::task::spawn_blocking(move || detector.find_duplicates(store.as_ref(), vector.as_ref(), ids.as_deref())).await??;
        Ok(groups)
    }

    pub async fn cluster(&self, ids: Option<Vec<String>>, params: ClusterParams) -> Result<Vec<Cluster>> {
        let engine = ClusterEngine::new(params, self.config.index.dim)?;
        let store = self.load_store()?;
        let clusters = tokio::task::spawn_blocking(move || {
            let ids = match ids {
                Some(ids) => ids,
                None => store.ids()?,
            };
            engine.cluster(store.as_ref(), &ids)
        })
        .await??;
        Ok(clusters)
    }
}
