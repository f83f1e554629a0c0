//! docsift-embed
//!
//! Deterministic feature-hashing embedder. Real models live outside this
//! workspace; this provider gives development, tests and the CLI a stable
//! stand-in with the same contract (fixed dimension, L2-normalized output).

use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use docsift_core::error::{Error, Result};
use docsift_core::hashing::{l2_normalize, normalize_text};
use docsift_core::traits::EmbeddingProvider;

pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hashing:d{dim}") }
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn provider_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dim == 0 { return Err(Error::EmbeddingUnavailable("zero-dimension embedder".into())); }
        let mut v = vec![0f32; self.dim];
        for (i, token) in normalize_text(text).split(' ').filter(|t| !t.is_empty()).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        l2_normalize(&mut v);
        Ok(v)
    }
}

pub fn default_embedder(dim: usize) -> Box<dyn EmbeddingProvider> {
    tracing::debug!(dim, "using hashing embedder");
    Box::new(HashingEmbedder::new(dim))
}
