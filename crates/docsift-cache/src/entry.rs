use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A serialized result stamped with the corpus version it was computed against.
///
/// An entry is only valid while `content_version` equals the current corpus
/// version; anything else is a miss and gets evicted on lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub content_version: u64,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, content_version: u64) -> Self {
        Self { key: key.into(), value: value.into(), content_version, created_at: Utc::now().timestamp_millis() }
    }

    pub fn is_current(&self, version: u64) -> bool { self.content_version == version }
}

/// Stable fingerprint of any serializable request description (hex blake3 of its JSON form).
pub fn fingerprint<T: Serialize>(request: &T) -> docsift_core::Result<String> {
    let bytes = serde_json::to_vec(request).map_err(|e| docsift_core::Error::Operation(format!("fingerprint: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
