//! Corpus-level analysis: duplicate detection and topic clustering.
//!
//! Both operate read-only over a `DocumentStore` and produce disposable
//! results; nothing here writes back to documents or indexes.

pub mod cluster;
pub mod dedup;
pub mod union_find;

pub use cluster::{ClusterEngine, ClusterParams};
pub use dedup::DuplicateDetector;
pub use union_find::UnionFind;
