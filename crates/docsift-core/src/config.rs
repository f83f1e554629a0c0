//! Layered configuration loader, typed engine settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_DEDUP__THRESHOLD`).
//! Every typed section validates eagerly; out-of-range values fail with
//! `Error::ConfigInvalid` at load time rather than at query time.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load_from_dir(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.engine()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(EngineConfig::default())).merge(figment) }
    }

    /// The full typed configuration, validated.
    pub fn engine(&self) -> Result<EngineConfig> {
        let cfg: EngineConfig = self.figment.extract().map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub query: QueryConfig,
    pub cache: CacheConfig,
    pub dedup: DedupConfig,
    pub cluster: ClusterConfig,
    pub index: IndexConfig,
    pub data: DataConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.cache.validate()?;
        self.dedup.validate()?;
        self.index.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_limit: usize,
    pub default_limit: usize,
    /// Reciprocal rank fusion damping constant.
    pub rrf_c: f64,
    /// Entries taken from each ranked list before fusion.
    pub candidate_depth: usize,
    pub lexical_timeout_ms: u64,
    pub vector_timeout_ms: u64,
    pub embed_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_limit: 200,
            default_limit: 20,
            rrf_c: 60.0,
            candidate_depth: 100,
            lexical_timeout_ms: 2_000,
            vector_timeout_ms: 2_000,
            embed_timeout_ms: 2_000,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_limit == 0 {
            return Err(Error::ConfigInvalid("search.max_limit must be at least 1".into()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(Error::ConfigInvalid(format!("search.default_limit must lie in [1, {}]", self.max_limit)));
        }
        if !(self.rrf_c.is_finite() && self.rrf_c > 0.0) {
            return Err(Error::ConfigInvalid(format!("search.rrf_c must be positive, got {}", self.rrf_c)));
        }
        if self.candidate_depth == 0 {
            return Err(Error::ConfigInvalid("search.candidate_depth must be at least 1".into()));
        }
        if self.lexical_timeout_ms == 0 || self.vector_timeout_ms == 0 || self.embed_timeout_ms == 0 {
            return Err(Error::ConfigInvalid("search timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Extra `token -> expansion phrase` entries layered over the built-in table.
    pub abbreviations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub memory_capacity: u64,
    pub local_dir: Option<String>,
    pub local_capacity: usize,
    pub shared_uri: Option<String>,
    pub shared_table: String,
    pub shared_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 1_024,
            local_dir: None,
            local_capacity: 10_000,
            shared_uri: None,
            shared_table: "result_cache".to_string(),
            shared_capacity: 100_000,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.memory_capacity == 0 || self.local_capacity == 0 || self.shared_capacity == 0 {
            return Err(Error::ConfigInvalid("cache capacities must be at least 1".into()));
        }
        if self.shared_table.trim().is_empty() {
            return Err(Error::ConfigInvalid("cache.shared_table must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Near-duplicate similarity cutoff, in `(0, 1]`.
    pub threshold: f32,
    /// Nearest neighbours inspected per document.
    pub window: usize,
}

impl Default for DedupConfig {
    fn default() -> Self { Self { threshold: 0.92, window: 10 } }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(Error::ConfigInvalid(format!("dedup.threshold must lie in (0, 1], got {}", self.threshold)));
        }
        if self.window == 0 {
            return Err(Error::ConfigInvalid("dedup.window must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`.
    #[default]
    Cosine,
    Euclidean,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub tantivy_dir: String,
    pub lancedb_dir: String,
    pub table: String,
    /// Embedding dimension `D` for this deployment.
    pub dim: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            tantivy_dir: "./data/indexes/tantivy".to_string(),
            lancedb_dir: "./data/indexes/lancedb".to_string(),
            table: "documents".to_string(),
            dim: 384,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::ConfigInvalid("index.dim must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub corpus: String,
}

impl Default for DataConfig {
    fn default() -> Self { Self { corpus: "./data/corpus".to_string() } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
