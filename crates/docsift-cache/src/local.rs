//! Local persistent tier: one JSON file per entry in a directory.
//!
//! Entries are written to a temp file in the same directory and renamed into
//! place, so readers never observe a partial file. A read refreshes the file's
//! mtime; when the directory holds more than `capacity` entries the least
//! recently used files are removed.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::debug;

use docsift_core::{Error, Result};

use crate::entry::CacheEntry;
use crate::tier::CacheTier;

const ENTRY_EXT: &str = "json";

pub struct LocalDiskTier {
    dir: PathBuf,
    capacity: usize,
    prune_lock: Mutex<()>,
}

impl LocalDiskTier {
    pub fn open(dir: &Path, capacity: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf(), capacity: capacity.max(1), prune_lock: Mutex::new(()) })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe = key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let name = if safe { key.to_string() } else { blake3::hash(key.as_bytes()).to_hex().to_string() };
        self.dir.join(format!("{name}.{ENTRY_EXT}"))
    }

    fn entry_files(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut out = Vec::new();
        for e in fs::read_dir(&self.dir)? {
            let e = e?;
            let path = e.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ENTRY_EXT) { continue; }
            let mtime = e.metadata().and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((path, mtime));
        }
        Ok(out)
    }

    fn prune(&self) -> Result<()> {
        let _guard = self.prune_lock.lock().map_err(|_| Error::Operation("local cache lock poisoned".into()))?;
        let mut files = self.entry_files()?;
        if files.len() <= self.capacity { return Ok(()); }
        files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let surplus = files.len() - self.capacity;
        for (path, _) in files.into_iter().take(surplus) {
            remove_if_exists(&path)?;
        }
        debug!(removed = surplus, "local cache pruned");
        Ok(())
    }
}

impl CacheTier for LocalDiskTier {
    fn name(&self) -> &'static str { "local" }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_slice(&raw).map_err(|e| Error::CacheCorruption(format!("{}: {e}", path.display())))?;
        if entry.key != key {
            return Err(Error::CacheCorruption(format!("{}: key mismatch", path.display())));
        }
        if let Ok(f) = fs::File::options().write(true).open(&path) {
            let _ = f.set_modified(SystemTime::now());
        }
        Ok(Some(entry))
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_vec(entry).map_err(|e| Error::Operation(e.to_string()))?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(&entry.key)).map_err(|e| Error::Operation(format!("publishing cache entry: {e}")))?;
        self.prune()
    }

    fn remove(&self, key: &str) -> Result<()> {
        remove_if_exists(&self.path_for(key))
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let e = CacheEntry::new("abc", "{\"hits\":[]}", 7);
        LocalDiskTier::open(tmp.path(), 10).unwrap().put(&e).unwrap();
        let reopened = LocalDiskTier::open(tmp.path(), 10).unwrap();
        assert_eq!(reopened.get("abc").unwrap(), Some(e));
    }

    #[test]
    fn garbage_file_is_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let tier = LocalDiskTier::open(tmp.path(), 10).unwrap();
        fs::write(tmp.path().join("bad.json"), b"{not json").unwrap();
        assert!(matches!(tier.get("bad"), Err(Error::CacheCorruption(_))));
        tier.remove("bad").unwrap();
        assert_eq!(tier.get("bad").unwrap(), None);
    }

    #[test]
    fn prune_keeps_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let tier = LocalDiskTier::open(tmp.path(), 3).unwrap();
        for i in 0..6 {
            tier.put(&CacheEntry::new(format!("k{i}"), "v", 1)).unwrap();
        }
        assert_eq!(tier.entry_files().unwrap().len(), 3);
    }

    #[test]
    fn unsafe_keys_are_hashed_into_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let tier = LocalDiskTier::open(tmp.path(), 10).unwrap();
        let e = CacheEntry::new("../escape", "v", 1);
        tier.put(&e).unwrap();
        assert_eq!(tier.get("../escape").unwrap(), Some(e));
        assert!(!tmp.path().parent().unwrap().join("escape.json").exists());
    }
}
