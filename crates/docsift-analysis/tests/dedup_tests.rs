use std::collections::BTreeSet;

use proptest::prelude::*;

use docsift_analysis::{DuplicateDetector, UnionFind};
use docsift_core::config::DedupConfig;
use docsift_core::error::Error;
use docsift_core::store::InMemoryDocumentStore;
use docsift_core::traits::VectorIndex;
use docsift_core::types::{Document, DocumentMetadata, SimilarityMethod};
use docsift_vector::FlatVectorIndex;

fn unit(angle_deg: f64) -> Vec<f32> {
    let r = angle_deg.to_radians();
    vec![r.cos() as f32, r.sin() as f32, 0.0]
}

fn doc(id: &str, content: &str, embedding: Vec<f32>) -> Document {
    Document::new(id, content, embedding, DocumentMetadata::default())
}

fn setup(docs: Vec<Document>) -> (InMemoryDocumentStore, FlatVectorIndex) {
    let index = FlatVectorIndex::new(3);
    index.index(&docs).unwrap();
    (InMemoryDocumentStore::from_documents(docs), index)
}

fn detector() -> DuplicateDetector {
    DuplicateDetector::new(DedupConfig::default()).unwrap()
}

#[test]
fn separate_pairs_form_separate_groups() {
    let a = vec![1.0, 0.0, 0.0];
    let b = vec![0.95, (1.0f32 - 0.95 * 0.95).sqrt(), 0.0];
    let c = vec![0.0, 0.0, 1.0];
    let d = vec![0.0, (1.0f32 - 0.93 * 0.93).sqrt(), 0.93];
    let e = vec![0.0, 1.0, 0.0];
    let (store, index) = setup(vec![doc("a", "alpha", a), doc("b", "bravo", b), doc("c", "charlie", c), doc("d", "delta", d), doc("e", "echo", e)]);

    let groups = detector().find_duplicates(&store, &index, None).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].canonical_id, "a");
    assert_eq!(groups[0].duplicate_ids, vec!["b"]);
    assert!((groups[0].pairs[0].similarity - 0.95).abs() < 1e-3);
    assert_eq!(groups[1].canonical_id, "c");
    assert_eq!(groups[1].duplicate_ids, vec!["d"]);
    assert!(groups.iter().flat_map(|g| &g.pairs).all(|p| p.method == SimilarityMethod::Embedding));
}

#[test]
fn pairs_sharing_a_member_merge_transitively() {
    // a~b at 0.95, b~x at 0.93, a and x only 0.77 apart
    let ab = 0.95f64.acos().to_degrees();
    let bx = 0.93f64.acos().to_degrees();
    let (store, index) = setup(vec![doc("a", "alpha", unit(0.0)), doc("b", "bravo", unit(ab)), doc("x", "xray", unit(ab + bx)), doc("z", "zulu", unit(120.0))]);

    let groups = detector().find_duplicates(&store, &index, None).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical_id, "a");
    assert_eq!(groups[0].duplicate_ids, vec!["b", "x"]);
    assert_eq!(groups[0].pairs.len(), 2);
}

#[test]
fn equal_hashes_are_exact_duplicates() {
    let (store, index) = setup(vec![
        doc("d2", "Quarterly  Report", vec![]),
        doc("d1", "quarterly report", vec![]),
        doc("d3", "something else", vec![]),
    ]);
    let groups = detector().find_duplicates(&store, &index, None).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical_id, "d1");
    assert_eq!(groups[0].duplicate_ids, vec!["d2"]);
    assert_eq!(groups[0].pairs[0].method, SimilarityMethod::Hash);
    assert_eq!(groups[0].pairs[0].similarity, 1.0);
}

#[test]
fn explicit_ids_limit_the_scope() {
    let (store, index) = setup(vec![doc("a", "alpha", unit(0.0)), doc("b", "bravo", unit(5.0)), doc("c", "charlie", unit(90.0))]);
    let scope = vec!["a".to_string(), "c".to_string()];
    assert!(detector().find_duplicates(&store, &index, Some(&scope)).unwrap().is_empty());

    let unknown = vec!["a".to_string(), "nope".to_string()];
    assert!(matches!(detector().find_duplicates(&store, &index, Some(&unknown)), Err(Error::NotFound(_))));
}

#[test]
fn threshold_is_validated_eagerly() {
    for bad in [0.0f32, -0.5, 1.01, f32::NAN] {
        assert!(matches!(DuplicateDetector::new(DedupConfig { threshold: bad, window: 10 }), Err(Error::ConfigInvalid(_))));
    }
    assert!(DuplicateDetector::new(DedupConfig { threshold: 1.0, window: 10 }).is_ok());
}

#[test]
fn similarity_equal_to_threshold_is_not_a_duplicate() {
    // b's embedding is identical to a's (cosine exactly 1.0) but its content differs
    let strict = DuplicateDetector::new(DedupConfig { threshold: 1.0, window: 10 }).unwrap();
    let (store, index) = setup(vec![doc("a", "alpha", unit(0.0)), doc("b", "bravo", unit(0.0)), doc("c", "alpha", unit(0.0))]);
    let groups = strict.find_duplicates(&store, &index, None).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].canonical_id, "a");
    assert_eq!(groups[0].duplicate_ids, vec!["c"], "only the exact hash match is grouped");
    assert!(groups[0].pairs.iter().all(|p| p.method == SimilarityMethod::Hash));
}

proptest! {
    #[test]
    fn union_find_groups_are_the_connected_components(n in 2usize..30, edges in prop::collection::vec((0usize..30, 0usize..30), 0..40)) {
        let edges: Vec<(usize, usize)> = edges.into_iter().map(|(a, b)| (a % n, b % n)).collect();
        let mut uf = UnionFind::new(n);
        for &(a, b) in &edges {
            uf.union(a, b);
        }
        for &(a, b) in &edges {
            prop_assert_eq!(uf.find(a), uf.find(b));
        }
        let groups = uf.groups();
        let mut seen = BTreeSet::new();
        for g in &groups {
            prop_assert!(g.len() > 1);
            for &m in g {
                prop_assert!(seen.insert(m), "member in two groups");
                prop_assert_eq!(uf.find(m), uf.find(g[0]));
            }
        }
    }

    #[test]
    fn near_duplicate_chains_land_in_one_group(len in 2usize..8) {
        // consecutive documents 10 degrees apart (cos ~ 0.985), ends far apart
        let docs: Vec<Document> = (0..len).map(|i| doc(&format!("c{i}"), &format!("chain {i}"), unit(i as f64 * 10.0))).collect();
        let (store, index) = setup(docs);
        let groups = detector().find_duplicates(&store, &index, None).unwrap();
        prop_assert_eq!(groups.len(), 1);
        prop_assert_eq!(groups[0].duplicate_ids.len(), len - 1);
    }
}
