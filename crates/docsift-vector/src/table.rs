//! LanceDB connection and housekeeping helpers.
//!
//! Opens databases, creates tables on first use and builds the SQL predicates
//! the adapters push down into Lance scans.

use anyhow::{bail, Result};
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

use docsift_core::types::SearchFilters;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

/// Open `name`, creating it with `schema` if absent. An existing table must
/// have the same column names as `schema`.
pub async fn open_or_create(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<Table> {
    ensure_table(conn, name, schema.clone()).await?;
    let table = conn.open_table(name).execute().await?;
    let existing = table.schema().await?;
    for field in schema.fields() {
        let Ok(found) = existing.field_with_name(field.name()) else {
            bail!("table {name} is missing column {}", field.name());
        };
        if found.data_type() != field.data_type() {
            bail!("table {name} column {} has type {}, expected {}", field.name(), found.data_type(), field.data_type());
        }
    }
    Ok(table)
}

/// Quote a string literal for a Lance SQL predicate.
pub fn sql_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Pushdown predicate for `filters`, or `None` when nothing is restricted.
pub fn filter_predicate(filters: &SearchFilters) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(t) = &filters.source_type {
        clauses.push(format!("source_type = {}", sql_str(t)));
    }
    for tag in &filters.tags {
        clauses.push(format!("tags LIKE {}", sql_str(&format!("%,{tag},%"))));
    }
    if let Some(range) = filters.time_range {
        clauses.push("timestamp IS NOT NULL".to_string());
        if let Some(lo) = range.start { clauses.push(format!("timestamp >= {lo}")); }
        if let Some(hi) = range.end { clauses.push(format!("timestamp <= {hi}")); }
    }
    if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
}

/// `,a,b,` encoding of a tag set; empty sets encode as `,`.
pub fn encode_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> String {
    let mut out = String::from(",");
    for t in tags {
        out.push_str(t);
        out.push(',');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::types::TimeRange;

    #[test]
    fn predicate_combines_all_filters() {
        let f = SearchFilters {
            source_type: Some("o'mail".into()),
            tags: ["a".to_string(), "b".to_string()].into_iter().collect(),
            time_range: Some(TimeRange { start: Some(5), end: None }),
        };
        assert_eq!(
            filter_predicate(&f).unwrap(),
            "source_type = 'o''mail' AND tags LIKE '%,a,%' AND tags LIKE '%,b,%' AND timestamp IS NOT NULL AND timestamp >= 5"
        );
        assert_eq!(filter_predicate(&SearchFilters::default()), None);
    }

    #[test]
    fn tags_encode_with_sentinels() {
        let tags: Vec<String> = vec!["x".into(), "y".into()];
        assert_eq!(encode_tags(&tags), ",x,y,");
        assert_eq!(encode_tags(&Vec::<String>::new()), ",");
    }
}
