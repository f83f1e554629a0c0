use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use docsift_core::error::Error;
use docsift_core::traits::LexicalIndex;
use docsift_core::types::{Document, HitSource, RankedHit, SearchFilters};

use crate::search::filter_clauses;
use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Clone, Copy)]
pub(crate) struct Fields {
	pub id: Field,
	pub text: Field,
	pub source_type: Field,
	pub tags: Field,
	pub timestamp: Field,
}

impl Fields {
	fn resolve(index: &Index) -> Result<Self> {
		let schema = index.schema();
		Ok(Self {
			id: schema.get_field("id")?,
			text: schema.get_field("text")?,
			source_type: schema.get_field("source_type")?,
			tags: schema.get_field("tags")?,
			timestamp: schema.get_field("timestamp")?,
		})
	}
}

/// BM25 keyword index over document content with metadata filter fields.
pub struct TantivyLexicalIndex {
	index: Index,
	reader: IndexReader,
	fields: Fields,
}

impl TantivyLexicalIndex {
	/// Create a fresh index in `index_dir`, wiping anything already there.
	pub fn create_in_dir(index_dir: &Path) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		Self::from_index(Index::create_in_dir(index_dir, build_schema())?)
	}

	pub fn open_in_dir(index_dir: &Path) -> Result<Self> {
		Self::from_index(Index::open_in_dir(index_dir)?)
	}

	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let fields = Fields::resolve(&index)?;
		Ok(Self { index, reader, fields })
	}

	pub fn num_docs(&self) -> u64 { self.reader.searcher().num_docs() }

	fn index_docs(&self, docs: &[Document]) -> Result<()> {
		let mut writer: IndexWriter = self.index.writer(WRITER_HEAP_BYTES)?;
		for d in docs {
			writer.delete_term(Term::from_field_text(self.fields.id, &d.id));
			let mut doc = TantivyDocument::default();
			doc.add_text(self.fields.id, &d.id);
			doc.add_text(self.fields.text, &d.content);
			if let Some(st) = &d.metadata.source_type { doc.add_text(self.fields.source_type, st); }
			for tag in &d.metadata.tags { doc.add_text(self.fields.tags, tag); }
			if let Some(ts) = d.metadata.timestamp { doc.add_i64(self.fields.timestamp, ts); }
			writer.add_document(doc)?;
		}
		writer.commit()?;
		self.reader.reload()?;
		info!(docs = docs.len(), "lexical index committed");
		Ok(())
	}

	/// Analyze the query with the index tokenizer; unique terms in sorted order.
	fn query_terms(&self, query: &str) -> Result<Vec<String>> {
		let mut analyzer = self.index.tokenizer_for_field(self.fields.text)?;
		let mut stream = analyzer.token_stream(query);
		let mut terms = BTreeSet::new();
		while stream.advance() { terms.insert(stream.token().text.clone()); }
		Ok(terms.into_iter().collect())
	}

	fn search_docs(&self, query: &str, filters: &SearchFilters, limit: usize) -> Result<Vec<RankedHit>> {
		let terms = self.query_terms(query)?;
		if terms.is_empty() || limit == 0 { return Ok(vec![]); }
		let should: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(self.fields.text, t), IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, Box::new(BooleanQuery::new(should)))];
		clauses.extend(filter_clauses(&self.index, self.fields, filters)?);
		let q = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let total = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
		// TopDocs breaks score ties by doc address; widen the fetch until the
		// boundary score is fully inside so ties can be re-ranked by id
		let mut fetch = limit.saturating_add(1);
		let top_docs = loop {
			let top = searcher.search(&q, &TopDocs::with_limit(fetch))?;
			if top.len() < fetch || fetch >= total || top[limit - 1].0 > top[top.len() - 1].0 {
				break top;
			}
			fetch = fetch.saturating_mul(2);
		};
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(self.fields.id).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(RankedHit::new(id, f64::from(score), HitSource::Lexical));
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
		hits.truncate(limit);
		debug!(terms = terms.len(), hits = hits.len(), "lexical search");
		Ok(hits)
	}
}

impl LexicalIndex for TantivyLexicalIndex {
	fn index(&self, docs: &[Document]) -> docsift_core::Result<()> {
		self.index_docs(docs).map_err(|e| Error::Operation(format!("lexical indexing failed: {e}")))
	}

	fn search(&self, query: &str, filters: &SearchFilters, limit: usize) -> docsift_core::Result<Vec<RankedHit>> {
		self.search_docs(query, filters, limit).map_err(Error::lexical_unavailable)
	}
}
