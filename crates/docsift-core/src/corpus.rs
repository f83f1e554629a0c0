//! Corpus loading for the CLI and tests.
//!
//! Accepts a single `.json` file (array of records), a `.jsonl` file (one
//! record per line), or a directory tree containing either. Ingestion proper
//! happens elsewhere; this only reads records that are already extracted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::traits::EmbeddingProvider;
use crate::types::{Document, DocumentMetadata};

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

#[derive(Default)]
pub struct CorpusLoader {
    limit: Option<usize>,
}

impl CorpusLoader {
    pub fn new() -> Self { Self::default() }

    pub fn with_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    pub fn load(&self, path: &Path) -> Result<Vec<DocumentRecord>> {
        let files = if path.is_dir() { list_corpus_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            warn!(path = %path.display(), "no .json/.jsonl files found");
            return Ok(vec![]);
        }
        let mut records = Vec::new();
        for file in &files {
            records.extend(read_records(file)?);
            if let Some(lim) = self.limit {
                if records.len() >= lim {
                    records.truncate(lim);
                    break;
                }
            }
        }
        info!(files = files.len(), records = records.len(), "corpus loaded");
        Ok(records)
    }

    /// Convert records to documents, embedding the ones that arrived without a
    /// vector when a provider is given.
    pub fn into_documents(&self, records: Vec<DocumentRecord>, provider: Option<&dyn EmbeddingProvider>) -> Result<Vec<Document>> {
        let mut docs = Vec::with_capacity(records.len());
        for r in records {
            let embedding = match (r.embedding, provider) {
                (Some(v), _) => v,
                (None, Some(p)) => p.embed(&r.content).with_context(|| format!("embedding {}", r.id))?,
                (None, None) => Vec::new(),
            };
            docs.push(Document::new(r.id, r.content, embedding, r.metadata));
        }
        Ok(docs)
    }
}

fn read_records(file: &Path) -> Result<Vec<DocumentRecord>> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        raw.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(n, l)| serde_json::from_str(l).with_context(|| format!("{}:{}", file.display(), n + 1)))
            .collect()
    } else {
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))
    }
}

fn list_corpus_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    files.sort();
    files
}
