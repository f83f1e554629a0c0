//! docsift-core
//!
//! Domain types, error taxonomy, capability traits and configuration shared
//! by the retrieval, caching and analysis crates.

pub mod config;
pub mod corpus;
pub mod error;
pub mod hashing;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
