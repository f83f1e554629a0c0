use std::sync::Arc;

use docsift_core::config::EngineConfig;
use docsift_core::store::InMemoryDocumentStore;
use docsift_core::traits::EmbeddingProvider;
use docsift_core::types::{Document, DocumentMetadata, HitSource, Query, SearchFilters};
use docsift_embed::HashingEmbedder;
use docsift_hybrid::{Backends, HybridSearchEngine};
use docsift_text::TantivyLexicalIndex;
use docsift_vector::FlatVectorIndex;

const DIM: usize = 64;

fn corpus(embedder: &HashingEmbedder) -> Vec<Document> {
    let raw = [
        ("d1", "quarterly invoice for the purchase order", "mail"),
        ("d2", "purchase order purchase order approval", "pdf"),
        ("d3", "team offsite agenda and travel", "mail"),
        ("d4", "invoice reminder for overdue payment", "mail"),
        ("d5", "approval workflow for travel expenses", "pdf"),
    ];
    raw.iter()
        .map(|(id, text, source)| {
            let metadata = DocumentMetadata { source_type: Some(source.to_string()), timestamp: Some(100), ..Default::default() };
            Document::new(*id, *text, embedder.embed(text).unwrap(), metadata)
        })
        .collect()
}

fn engine() -> HybridSearchEngine {
    let embedder = Arc::new(HashingEmbedder::new(DIM));
    let docs = corpus(&embedder);
    let mut config = EngineConfig::default();
    config.index.dim = DIM;
    let backends = Backends {
        lexical: Arc::new(TantivyLexicalIndex::in_memory().unwrap()),
        vector: Arc::new(FlatVectorIndex::new(DIM)),
        embedder,
        store: Arc::new(InMemoryDocumentStore::from_documents(docs.clone())),
    };
    let engine = HybridSearchEngine::new(backends, &config).unwrap();
    engine.index(&docs).unwrap();
    engine
}

#[tokio::test]
async fn best_match_in_both_sources_ranks_first() {
    let engine = engine();
    let res = engine.hybrid_search(&Query::new("purchase order approval", 5)).await.unwrap();
    assert!(!res.degraded);
    assert_eq!(res.hits[0].id, "d2");
    assert!(res.hits.iter().all(|h| h.source == HitSource::Fused));
    for w in res.hits.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
}

#[tokio::test]
async fn abbreviation_reaches_the_lexical_index() {
    let engine = engine();
    let res = engine.hybrid_search(&Query::new("PO", 5)).await.unwrap();
    let ids: Vec<_> = res.hits.iter().map(|h| h.id.as_str()).collect();
    assert!(ids.contains(&"d1") && ids.contains(&"d2"), "expanded to purchase order: {ids:?}");
}

#[tokio::test]
async fn filters_apply_to_both_sources() {
    let engine = engine();
    let query = Query::new("invoice approval", 10).with_filters(SearchFilters { source_type: Some("pdf".into()), ..Default::default() });
    let res = engine.hybrid_search(&query).await.unwrap();
    assert!(!res.hits.is_empty());
    assert!(res.hits.iter().all(|h| h.id == "d2" || h.id == "d5"));
}
