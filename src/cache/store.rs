//! Content-addressed, TTL-bounded on-disk cache entries.
//!
//! Follows `cache/repo.rs`'s pattern of writing a JSON index and relying
//! on atomic replacement rather than locking: here each entry is its own
//! file, written via a tempfile-then-rename in the same directory so a
//! hard-kill mid-write never leaves a torn entry.

use crate::cache::CacheType;
use crate::error::{Error, ErrorCode, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Entry<T> {
    cached_at: u64,
    ttl_seconds: u64,
    payload: T,
}

/// A directory-per-cache-type JSON cache rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileCacheStore { root: root.into() }
    }

    fn dir_for(&self, cache_type: CacheType) -> PathBuf {
        self.root.join(cache_type.to_string())
    }

    fn entry_path(&self, cache_type: CacheType, key: &str) -> PathBuf {
        self.dir_for(cache_type).join(format!("{key}.json"))
    }

    pub fn get<T: DeserializeOwned>(&self, cache_type: CacheType, key: &str) -> Option<T> {
        let path = self.entry_path(cache_type, key);
        let data = fs::read_to_string(&path).ok()?;
        let entry: Entry<T> = serde_json::from_str(&data).ok()?;

        let now = now_unix();
        if now >= entry.cached_at.saturating_add(entry.ttl_seconds) {
            return None;
        }

        Some(entry.payload)
    }

    pub fn put<T: Serialize>(
        &self,
        cache_type: CacheType,
        key: &str,
        ttl_seconds: u64,
        payload: &T,
    ) -> Result<()> {
        let dir = self.dir_for(cache_type);
        fs::create_dir_all(&dir)?;

        let entry = Entry {
            cached_at: now_unix(),
            ttl_seconds,
            payload,
        };
        let serialized = serde_json::to_vec_pretty(&entry)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| Error::external(ErrorCode::Io, format!("cache tempfile: {e}")))?;
        std::io::Write::write_all(&mut tmp, &serialized)?;
        tmp.persist(self.entry_path(cache_type, key))
            .map_err(|e| Error::external(ErrorCode::Io, format!("cache rename: {e}")))?;

        Ok(())
    }

    /// Remove every entry of `cache_type`. Returns `(count, bytes)` of
    /// what was removed, so `--dry-run` can report without deleting.
    pub fn clear(&self, cache_type: CacheType, dry_run: bool) -> Result<(usize, u64)> {
        let dir = self.dir_for(cache_type);
        if !dir.exists() {
            return Ok((0, 0));
        }

        let mut count = 0usize;
        let mut bytes = 0u64;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            count += 1;
            bytes += meta.len();
            if !dry_run {
                fs::remove_file(entry.path())?;
            }
        }

        Ok((count, bytes))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        store
            .put(CacheType::Analysis, "abc", 3600, &"payload".to_owned())
            .unwrap();
        let got: Option<String> = store.get(CacheType::Analysis, "abc");
        assert_eq!(got.as_deref(), Some("payload"));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        store
            .put(CacheType::Analysis, "abc", 0, &"payload".to_owned())
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let got: Option<String> = store.get(CacheType::Analysis, "abc");
        assert!(got.is_none());
    }

    #[test]
    fn clear_dry_run_does_not_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        store
            .put(CacheType::Analysis, "abc", 3600, &"payload".to_owned())
            .unwrap();

        let (count, _bytes) = store.clear(CacheType::Analysis, true).unwrap();
        assert_eq!(count, 1);
        let got: Option<String> = store.get(CacheType::Analysis, "abc");
        assert_eq!(got.as_deref(), Some("payload"));
    }

    #[test]
    fn clear_for_real_empties_only_that_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        store
            .put(CacheType::Analysis, "abc", 3600, &"payload".to_owned())
            .unwrap();
        store
            .put(CacheType::Version, "def", 3600, &"other".to_owned())
            .unwrap();

        store.clear(CacheType::Analysis, false).unwrap();

        let analysis: Option<String> = store.get(CacheType::Analysis, "abc");
        assert!(analysis.is_none());
        let version: Option<String> = store.get(CacheType::Version, "def");
        assert_eq!(version.as_deref(), Some("other"));
    }
}
