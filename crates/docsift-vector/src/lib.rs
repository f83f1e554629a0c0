//! Vector retrieval backends and the Lance-backed shared cache tier.
//!
//! - `flat`: exact in-memory cosine search
//! - `lance`: persistent LanceDB table with SQL filter pushdown
//! - `cache`: `CacheTier` over a Lance table shared between processes

pub mod cache;
pub mod flat;
pub mod lance;
pub mod schema;
pub mod table;

pub use cache::LanceSharedTier;
pub use flat::FlatVectorIndex;
pub use lance::LanceVectorIndex;
