//! Exact in-memory nearest-neighbour index.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::warn;

use docsift_core::hashing::cosine_similarity;
use docsift_core::traits::VectorIndex;
use docsift_core::types::{Document, DocumentId, DocumentMetadata, HitSource, RankedHit, SearchFilters};
use docsift_core::{Error, Result};

struct Entry {
    embedding: Vec<f32>,
    metadata: DocumentMetadata,
}

/// Brute-force cosine search over every stored embedding.
///
/// Documents whose embedding does not have `dim` entries are skipped at
/// index time, so they never appear in results.
pub struct FlatVectorIndex {
    dim: usize,
    entries: RwLock<BTreeMap<DocumentId, Entry>>,
}

impl FlatVectorIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, entries: RwLock::new(BTreeMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl VectorIndex for FlatVectorIndex {
    fn dim(&self) -> usize { self.dim }

    fn index(&self, docs: &[Document]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| Error::Operation("vector index lock poisoned".into()))?;
        let mut skipped = 0usize;
        for doc in docs {
            if !doc.has_embedding(self.dim) {
                entries.remove(&doc.id);
                skipped += 1;
                continue;
            }
            entries.insert(doc.id.clone(), Entry { embedding: doc.embedding.clone(), metadata: doc.metadata.clone() });
        }
        if skipped > 0 {
            warn!(skipped, dim = self.dim, "documents without a usable embedding left out of the vector index");
        }
        Ok(())
    }

    fn search(&self, embedding: &[f32], limit: usize, filters: &SearchFilters) -> Result<Vec<RankedHit>> {
        if embedding.len() != self.dim {
            return Err(Error::vector_unavailable(format!("query embedding has {} dims, index expects {}", embedding.len(), self.dim)));
        }
        let entries = self.entries.read().map_err(|_| Error::vector_unavailable("vector index lock poisoned"))?;
        let mut hits: Vec<RankedHit> = entries
            .iter()
            .filter(|(_, e)| filters.matches(&e.metadata))
            .map(|(id, e)| RankedHit::new(id.clone(), f64::from(cosine_similarity(embedding, &e.embedding)), HitSource::Vector))
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, v: Vec<f32>, source: &str) -> Document {
        let metadata = DocumentMetadata { source_type: Some(source.into()), ..Default::default() };
        Document::new(id, id, v, metadata)
    }

    #[test]
    fn nearest_first_ties_by_id() {
        let idx = FlatVectorIndex::new(2);
        idx.index(&[doc("b", vec![1.0, 0.0], "x"), doc("a", vec![1.0, 0.0], "x"), doc("c", vec![0.0, 1.0], "x")]).unwrap();
        let ids: Vec<_> = idx.search(&[1.0, 0.1], 3, &SearchFilters::default()).unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn wrong_dimension_documents_are_skipped() {
        let idx = FlatVectorIndex::new(2);
        idx.index(&[doc("ok", vec![1.0, 0.0], "x"), doc("short", vec![1.0], "x"), doc("none", vec![], "x")]).unwrap();
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn filters_and_limit_apply() {
        let idx = FlatVectorIndex::new(2);
        idx.index(&[doc("a", vec![1.0, 0.0], "mail"), doc("b", vec![0.9, 0.1], "pdf"), doc("c", vec![0.5, 0.5], "mail")]).unwrap();
        let f = SearchFilters { source_type: Some("mail".into()), ..Default::default() };
        let hits = idx.search(&[1.0, 0.0], 1, &f).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn query_dimension_mismatch_is_unavailable() {
        let idx = FlatVectorIndex::new(3);
        assert!(matches!(idx.search(&[1.0], 5, &SearchFilters::default()), Err(Error::BackendUnavailable { .. })));
    }
}
