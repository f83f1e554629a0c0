use docsift_analysis::{ClusterEngine, ClusterParams};
use docsift_core::config::{ClusterConfig, DistanceMetric};
use docsift_core::error::Error;
use docsift_core::store::InMemoryDocumentStore;
use docsift_core::traits::DocumentStore;
use docsift_core::types::{Document, DocumentMetadata, NOISE_CLUSTER_ID};

fn doc(id: &str, v: &[f32]) -> Document {
    Document::new(id, id, v.to_vec(), DocumentMetadata::default())
}

fn blobs() -> Vec<Document> {
    vec![
        doc("a1", &[1.0, 0.0, 0.0]),
        doc("a2", &[0.99, 0.05, 0.0]),
        doc("a3", &[0.98, 0.0, 0.05]),
        doc("b1", &[0.0, 1.0, 0.0]),
        doc("b2", &[0.05, 0.99, 0.0]),
        doc("b3", &[0.0, 0.98, 0.05]),
        doc("zz", &[0.0, 0.0, 1.0]),
    ]
}

fn engine(eps: f32, min_pts: usize) -> ClusterEngine {
    ClusterEngine::new(ClusterParams::new(eps, min_pts).unwrap(), 3).unwrap()
}

fn euclidean(eps: f32, min_pts: usize, dim: usize) -> ClusterEngine {
    let params = ClusterParams::new(eps, min_pts).unwrap().with_config(&ClusterConfig { metric: DistanceMetric::Euclidean });
    ClusterEngine::new(params, dim).unwrap()
}

#[test]
fn dense_groups_cluster_and_outliers_are_noise() {
    let clusters = engine(0.05, 2).cluster_documents(&blobs());
    assert_eq!(clusters.len(), 3);
    assert_eq!(clusters[0].member_ids, vec!["a1", "a2", "a3"]);
    assert_eq!(clusters[1].member_ids, vec!["b1", "b2", "b3"]);
    let noise = &clusters[2];
    assert!(noise.noise);
    assert_eq!(noise.cluster_id, NOISE_CLUSTER_ID);
    assert_eq!(noise.member_ids, vec!["zz"]);
    assert!(noise.centroid.is_none());
}

#[test]
fn centroid_is_the_member_mean() {
    let docs = vec![doc("p", &[1.0, 0.0]), doc("q", &[3.0, 0.0]), doc("r", &[2.0, 3.0])];
    let clusters = euclidean(5.0, 1, 2).cluster_documents(&docs);
    assert_eq!(clusters.len(), 1);
    let c = clusters[0].centroid.as_ref().unwrap();
    assert!((c[0] - 2.0).abs() < 1e-6 && (c[1] - 1.0).abs() < 1e-6);
}

#[test]
fn input_order_does_not_change_assignments() {
    let forward = engine(0.05, 2).cluster_documents(&blobs());
    let mut reversed = blobs();
    reversed.reverse();
    assert_eq!(engine(0.05, 2).cluster_documents(&reversed), forward);
    assert_eq!(engine(0.05, 2).cluster_documents(&blobs()), forward);
}

#[test]
fn core_points_need_min_pts_other_neighbours() {
    // two points within eps of each other: each has one other neighbour
    let docs = vec![doc("a", &[1.0, 0.0, 0.0]), doc("b", &[1.0, 0.01, 0.0])];
    assert_eq!(engine(0.1, 1).cluster_documents(&docs).len(), 1);
    let all_noise = engine(0.1, 2).cluster_documents(&docs);
    assert_eq!(all_noise.len(), 1);
    assert!(all_noise[0].noise);
}

#[test]
fn border_point_goes_to_the_first_cluster_reaching_it() {
    // m lies exactly eps from a1 and from z1 but has too few neighbours to be core
    let pts: [(&str, [f32; 2]); 9] = [
        ("a1", [0.0, 0.0]),
        ("a2", [0.0, 0.5]),
        ("a3", [0.0, -0.5]),
        ("a4", [-0.5, 0.0]),
        ("m", [2.0, 0.0]),
        ("z1", [4.0, 0.0]),
        ("z2", [4.0, 0.5]),
        ("z3", [4.0, -0.5]),
        ("z4", [4.5, 0.0]),
    ];
    let docs: Vec<Document> = pts.iter().map(|(id, v)| doc(id, v)).collect();
    let clusters = euclidean(2.0, 3, 2).cluster_documents(&docs);
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].member_ids, vec!["a1", "a2", "a3", "a4", "m"]);
    assert_eq!(clusters[1].member_ids, vec!["z1", "z2", "z3", "z4"]);
}

#[test]
fn documents_without_embeddings_are_noise() {
    let mut docs = blobs();
    docs.push(Document::new("empty", "no vector", vec![], DocumentMetadata::default()));
    docs.push(doc("short", &[1.0]));
    let clusters = engine(0.05, 2).cluster_documents(&docs);
    let noise = clusters.last().unwrap();
    assert!(noise.noise);
    assert_eq!(noise.member_ids, vec!["empty", "short", "zz"]);
}

#[test]
fn misshapen_first_document_does_not_set_the_dimension() {
    let mut docs = blobs();
    docs.push(doc("a0", &[1.0, 0.0]));
    let clusters = engine(0.05, 2).cluster_documents(&docs);
    assert_eq!(clusters.len(), 3);
    assert_eq!(clusters[0].member_ids, vec!["a1", "a2", "a3"]);
    assert_eq!(clusters[1].member_ids, vec!["b1", "b2", "b3"]);
    assert_eq!(clusters[2].member_ids, vec!["a0", "zz"]);
    assert_eq!(clusters[0].centroid.as_ref().map(Vec::len), Some(3));
}

#[test]
fn store_backed_clustering_checks_ids() {
    let store = InMemoryDocumentStore::from_documents(blobs());
    let ids = store.ids().unwrap();
    assert_eq!(engine(0.05, 2).cluster(&store, &ids).unwrap().len(), 3);
    assert!(matches!(engine(0.05, 2).cluster(&store, &["missing".to_string()]), Err(Error::NotFound(_))));
}

#[test]
fn parameters_are_validated() {
    assert!(matches!(ClusterParams::new(0.0, 2), Err(Error::ConfigInvalid(_))));
    assert!(matches!(ClusterParams::new(-1.0, 2), Err(Error::ConfigInvalid(_))));
    assert!(matches!(ClusterParams::new(f32::INFINITY, 2), Err(Error::ConfigInvalid(_))));
    assert!(matches!(ClusterParams::new(0.5, 0), Err(Error::ConfigInvalid(_))));
    assert!(matches!(ClusterEngine::new(ClusterParams::new(0.5, 2).unwrap(), 0), Err(Error::ConfigInvalid(_))));
}
