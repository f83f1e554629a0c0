//! Metadata filter clauses pushed down into the tantivy query.

use anyhow::Result;
use tantivy::query::{Occur, Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, Term};

use docsift_core::types::SearchFilters;

use crate::index::Fields;

pub(crate) fn filter_clauses(index: &Index, fields: Fields, filters: &SearchFilters) -> Result<Vec<(Occur, Box<dyn Query>)>> {
	let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
	if let Some(st) = &filters.source_type {
		clauses.push((Occur::Must, Box::new(TermQuery::new(Term::from_field_text(fields.source_type, st), IndexRecordOption::Basic))));
	}
	for tag in &filters.tags {
		clauses.push((Occur::Must, Box::new(TermQuery::new(Term::from_field_text(fields.tags, tag), IndexRecordOption::Basic))));
	}
	if let Some(range) = filters.time_range {
		let lo = range.start.map_or_else(|| "*".to_string(), |s| s.to_string());
		let hi = range.end.map_or_else(|| "*".to_string(), |e| e.to_string());
		let qp = QueryParser::for_index(index, vec![fields.timestamp]);
		clauses.push((Occur::Must, qp.parse_query(&format!("timestamp:[{lo} TO {hi}]"))?));
	}
	Ok(clauses)
}
