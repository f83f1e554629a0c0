use crate::error::Result;
use crate::types::{Document, DocumentId, RankedHit, SearchFilters};

/// External embedding provider. Vectors for one provider always have `dim()` entries.
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `hashing:d384`).
    fn provider_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Fails with `Error::EmbeddingUnavailable`.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Inverted-index keyword search.
///
/// `search` returns hits ordered by score descending with ties broken by id
/// ascending. No match is an empty vec; only an unreachable index is an error
/// (`Error::BackendUnavailable`).
pub trait LexicalIndex: Send + Sync {
    fn index(&self, docs: &[Document]) -> Result<()>;
    fn search(&self, query: &str, filters: &SearchFilters, limit: usize) -> Result<Vec<RankedHit>>;
}

/// Nearest-neighbour search over `dim()`-length embeddings, same ordering
/// contract as `LexicalIndex::search`.
pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn index(&self, docs: &[Document]) -> Result<()>;
    fn search(&self, embedding: &[f32], limit: usize, filters: &SearchFilters) -> Result<Vec<RankedHit>>;
}

/// Read access to document records and the corpus version.
pub trait DocumentStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Document>>;
    /// All ids, ascending.
    fn ids(&self) -> Result<Vec<DocumentId>>;
    /// Changes whenever any indexed document or its metadata changes.
    fn content_version(&self) -> u64;

    fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<Document>> {
        ids.iter()
            .map(|id| self.get(id)?.ok_or_else(|| crate::error::Error::NotFound(id.clone())))
            .collect()
    }
}
