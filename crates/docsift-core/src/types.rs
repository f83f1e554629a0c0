//! Domain types shared by the retrieval, caching and analysis crates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::hashing::content_hash;

pub type DocumentId = String;

/// Per-document metadata. Key order is irrelevant, so maps are ordered only
/// to keep serialization stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// An indexed document.
///
/// - `id`: stable, content-addressable identity assigned at ingestion
/// - `content_hash`: digest of the normalized content, equal hashes mean exact duplicates
/// - `embedding`: fixed-dimension vector; any other length keeps the document
///   out of vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    pub content_hash: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, content: impl Into<String>, embedding: Vec<f32>, metadata: DocumentMetadata) -> Self {
        let content = content.into();
        let content_hash = content_hash(&content);
        Self { id: id.into(), content, content_hash, embedding, metadata }
    }

    pub fn has_embedding(&self, dim: usize) -> bool {
        self.embedding.len() == dim && dim > 0
    }
}

/// Inclusive time window over `DocumentMetadata::timestamp`. Open ends are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeRange {
    pub fn contains(&self, ts: i64) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// Optional restrictions applied by both retrieval backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// A document must carry every tag listed here.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.source_type.is_none() && self.tags.is_empty() && self.time_range.is_none()
    }

    pub fn matches(&self, meta: &DocumentMetadata) -> bool {
        if let Some(t) = &self.source_type {
            if meta.source_type.as_deref() != Some(t.as_str()) {
                return false;
            }
        }
        if !self.tags.is_subset(&meta.tags) {
            return false;
        }
        match (self.time_range, meta.timestamp) {
            (None, _) => true,
            (Some(range), Some(ts)) => range.contains(ts),
            // a document without a timestamp cannot satisfy a time filter
            (Some(_), None) => false,
        }
    }
}

/// A raw user query before preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub filters: SearchFilters,
    pub limit: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self { text: text.into(), filters: SearchFilters::default(), limit }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// Which stage produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Lexical,
    Vector,
    Fused,
}

/// The minimal surface returned by every ranking stage.
///
/// Higher `score` is always better; its scale depends on `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub id: DocumentId,
    pub score: f64,
    pub source: HitSource,
}

impl RankedHit {
    pub fn new(id: impl Into<DocumentId>, score: f64, source: HitSource) -> Self {
        Self { id: id.into(), score, source }
    }
}

/// Result of a hybrid search. `degraded` is set whenever one retrieval source
/// could not contribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<RankedHit>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    Hash,
    Embedding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPair {
    pub doc_a: DocumentId,
    pub doc_b: DocumentId,
    pub similarity: f32,
    pub method: SimilarityMethod,
}

/// A set of documents considered the same; `canonical_id` is the lowest id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub canonical_id: DocumentId,
    pub duplicate_ids: Vec<DocumentId>,
    pub pairs: Vec<SimilarityPair>,
}

pub const NOISE_CLUSTER_ID: i32 = -1;

/// A topic group. The noise group uses `NOISE_CLUSTER_ID` and has no centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: i32,
    pub member_ids: Vec<DocumentId>,
    pub centroid: Option<Vec<f32>>,
    pub noise: bool,
}
