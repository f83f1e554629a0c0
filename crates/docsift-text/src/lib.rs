//! docsift-text
//!
//! Tantivy-backed lexical index. Queries are analyzed with the same tokenizer
//! as documents and OR-ed together under BM25; metadata filters are pushed
//! into the query as required clauses.

pub mod tantivy_utils;
pub mod index;
mod search;

pub use index::TantivyLexicalIndex;
