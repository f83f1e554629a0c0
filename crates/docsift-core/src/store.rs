//! In-process `DocumentStore`.
//!
//! Documents are immutable once stored except for metadata. `content_version`
//! is a digest of the current corpus state: the XOR of one digest per
//! document, kept up to date on every upsert or metadata change. Two stores
//! holding the same documents agree on it however they got there, and stores
//! that diverge get different versions, so shared cache entries are only
//! served to processes that see the same corpus.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::hashing::digest_u64;
use crate::traits::DocumentStore;
use crate::types::{Document, DocumentId, DocumentMetadata};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<BTreeMap<DocumentId, Document>>,
    version: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let map: BTreeMap<DocumentId, Document> = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
        let version = corpus_digest(&map);
        Self { docs: RwLock::new(map), version: AtomicU64::new(version) }
    }

    pub fn upsert(&self, doc: Document) -> Result<()> {
        let mut docs = self.write()?;
        let added = document_digest(&doc);
        let removed = docs.insert(doc.id.clone(), doc).map_or(0, |old| document_digest(&old));
        self.version.fetch_xor(added ^ removed, Ordering::SeqCst);
        Ok(())
    }

    pub fn update_metadata(&self, id: &str, metadata: DocumentMetadata) -> Result<()> {
        let mut docs = self.write()?;
        let doc = docs.get_mut(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        let removed = document_digest(doc);
        doc.metadata = metadata;
        self.version.fetch_xor(removed ^ document_digest(doc), Ordering::SeqCst);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn all(&self) -> Result<Vec<Document>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<DocumentId, Document>>> {
        self.docs.read().map_err(|_| Error::Operation("document store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<DocumentId, Document>>> {
        self.docs.write().map_err(|_| Error::Operation("document store lock poisoned".into()))
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn ids(&self) -> Result<Vec<DocumentId>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn content_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

fn corpus_digest(docs: &BTreeMap<DocumentId, Document>) -> u64 {
    docs.values().fold(0, |acc, d| acc ^ document_digest(d))
}

fn document_digest(d: &Document) -> u64 {
    let mut buf = Vec::new();
    buf.extend_from_slice(d.id.as_bytes());
    buf.push(0);
    buf.extend_from_slice(d.content_hash.as_bytes());
    buf.push(0);
    if let Ok(meta) = serde_json::to_vec(&d.metadata) {
        buf.extend_from_slice(&meta);
    }
    digest_u64(&buf)
}
