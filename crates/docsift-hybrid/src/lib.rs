//! Hybrid retrieval: query preprocessing, lexical and vector fan-out,
//! reciprocal rank fusion, and a single-flight result cache around it all.

pub mod engine;
pub mod fusion;
pub mod preprocess;

pub use engine::{Backends, HybridSearchEngine, Timeouts};
pub use fusion::{merge, FusionParams};
pub use preprocess::{PreparedQuery, QueryPreprocessor};
