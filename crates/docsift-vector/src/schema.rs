use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";

/// Document table: one row per embedded document. `tags` is stored as
/// `,a,b,` so a single tag can be matched with `LIKE '%,a,%'`.
pub fn build_document_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("source_type", DataType::Utf8, true),
        Field::new("tags", DataType::Utf8, false),
        Field::new("timestamp", DataType::Int64, true),
        Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

/// Shared result-cache table, keyed by request fingerprint.
pub fn build_cache_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("content_version", DataType::UInt64, false),
        Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

/// Dimension of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<i32> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => Some(*n),
        _ => None,
    }
}
