//! Exact and near-duplicate detection.
//!
//! Exact duplicates share a `content_hash`. Near duplicates are found by
//! asking the vector index for each remaining document's nearest neighbours
//! and keeping pairs strictly above the configured threshold. All pairs are
//! closed under union-find, so `a ~ b` and `b ~ c` put all three in one group.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use tracing::{info, warn};

use docsift_core::config::DedupConfig;
use docsift_core::traits::{DocumentStore, VectorIndex};
use docsift_core::types::{Document, DocumentId, DuplicateGroup, SearchFilters, SimilarityMethod, SimilarityPair};
use docsift_core::Result;

use crate::union_find::UnionFind;

pub struct DuplicateDetector {
    config: DedupConfig,
}

impl DuplicateDetector {
    /// Fails with `ConfigInvalid` unless the threshold lies in `(0, 1]`.
    pub fn new(config: DedupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Duplicate groups among `ids`, or among the whole store when `None`.
    ///
    /// Unknown ids fail with `NotFound`. Neighbours outside the requested set
    /// are ignored. If the vector index cannot be queried the result holds
    /// only exact duplicates.
    pub fn find_duplicates(&self, store: &dyn DocumentStore, vector: &dyn VectorIndex, ids: Option<&[DocumentId]>) -> Result<Vec<DuplicateGroup>> {
        let started = Instant::now();
        let scope: Vec<DocumentId> = match ids {
            Some(ids) => ids.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect(),
            None => store.ids()?,
        };
        let docs = store.get_many(&scope)?;
        let position: HashMap<&str, usize> = docs.iter().enumerate().map(|(i, d)| (d.id.as_str(), i)).collect();
        let mut uf = UnionFind::new(docs.len());
        let mut pairs: BTreeMap<(usize, usize), SimilarityPair> = BTreeMap::new();

        let exact = exact_groups(&docs);
        let mut grouped = vec![false; docs.len()];
        for group in &exact {
            let canonical = group[0];
            for &other in &group[1..] {
                uf.union(canonical, other);
                pairs.insert((canonical, other), pair(&docs, canonical, other, 1.0, SimilarityMethod::Hash));
            }
            for &i in group {
                grouped[i] = true;
            }
        }

        let dim = vector.dim();
        let window = self.config.window;
        let filters = SearchFilters::default();
        for (i, doc) in docs.iter().enumerate() {
            if grouped[i] || !doc.has_embedding(dim) {
                continue;
            }
            let neighbours = match vector.search(&doc.embedding, window + 1, &filters) {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(error = %e, "vector index unavailable, reporting exact duplicates only");
                    break;
                }
            };
            for hit in neighbours.iter().filter(|h| h.id != doc.id).take(window) {
                let Some(&j) = position.get(hit.id.as_str()) else { continue };
                let similarity = hit.score as f32;
                if similarity <= self.config.threshold {
                    continue;
                }
                let key = (i.min(j), i.max(j));
                if pairs.contains_key(&key) {
                    continue;
                }
                uf.union(i, j);
                pairs.insert(key, pair(&docs, key.0, key.1, similarity, SimilarityMethod::Embedding));
            }
        }

        let groups: Vec<DuplicateGroup> = uf
            .groups()
            .into_iter()
            .map(|members| {
                let member_set: BTreeSet<usize> = members.iter().copied().collect();
                let group_pairs = pairs
                    .iter()
                    .filter(|((a, b), _)| member_set.contains(a) && member_set.contains(b))
                    .map(|(_, p)| p.clone())
                    .collect();
                DuplicateGroup {
                    canonical_id: docs[members[0]].id.clone(),
                    duplicate_ids: members[1..].iter().map(|&m| docs[m].id.clone()).collect(),
                    pairs: group_pairs,
                }
            })
            .collect();
        info!(
            documents = docs.len(),
            exact_groups = exact.len(),
            groups = groups.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "duplicate scan finished"
        );
        Ok(groups)
    }
}

/// Indices of documents sharing a content hash, each group ascending.
fn exact_groups(docs: &[Document]) -> Vec<Vec<usize>> {
    let mut by_hash: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, d) in docs.iter().enumerate() {
        by_hash.entry(d.content_hash.as_str()).or_default().push(i);
    }
    by_hash.into_values().filter(|g| g.len() > 1).collect()
}

/// `docs` is sorted by id, so `a < b` keeps `doc_a < doc_b`.
fn pair(docs: &[Document], a: usize, b: usize, similarity: f32, method: SimilarityMethod) -> SimilarityPair {
    SimilarityPair { doc_a: docs[a].id.clone(), doc_b: docs[b].id.clone(), similarity, method }
}
