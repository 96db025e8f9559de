//! Persistent storage for transcripts and reconciled timelines, so re-rendering a
//! lecture does not pay for recognition again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::Task;
use crate::error::{DubError, Result};

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Key for a lecture's recognizer output.
pub fn transcript_key(lecture: &str, task: Task) -> String {
    format!("{lecture}_{}", task.cache_suffix())
}

/// Key for a lecture's reconciled timeline.
pub fn segments_key(lecture: &str, task: Task) -> String {
    format!("{}_segments", transcript_key(lecture, task))
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
        return Err(DubError::Cache(format!("invalid cache key '{key}'")));
    }
    Ok(())
}

/// One JSON file per key under a directory.
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl CacheStore for FsCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!("Cache hit: {}", path.display());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        std::fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves a truncated entry.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Cached {}", path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| DubError::Cache("memory cache lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

pub fn load_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    match cache.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DubError::Cache(format!("corrupt entry '{key}': {e}"))),
        None => Ok(None),
    }
}

pub fn store_json<T: Serialize + ?Sized>(cache: &dyn CacheStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    cache.put(key, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TranscriptSegment;
    use tempfile::TempDir;

    #[test]
    fn test_keys() {
        assert_eq!(transcript_key("lec1", Task::Translate), "lec1_en");
        assert_eq!(segments_key("lec1", Task::Translate), "lec1_en_segments");
        assert_eq!(transcript_key("lec1", Task::Transcribe), "lec1_original");
    }

    #[test]
    fn test_fs_cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = FsCache::new(dir.path().join("variables"));
        let segments = vec![TranscriptSegment::new(0.0, 1.5, " hi")];

        assert!(load_json::<Vec<TranscriptSegment>>(&cache, "lec_en").unwrap().is_none());
        store_json(&cache, "lec_en", &segments).unwrap();
        assert!(dir.path().join("variables").join("lec_en.json").exists());

        let loaded: Vec<TranscriptSegment> = load_json(&cache, "lec_en").unwrap().unwrap();
        assert_eq!(loaded, segments);

        cache.remove("lec_en").unwrap();
        cache.remove("lec_en").unwrap();
        assert!(cache.get("lec_en").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_keys() {
        let cache = FsCache::new("/tmp");
        assert!(matches!(cache.get("../etc/passwd"), Err(DubError::Cache(_))));
        assert!(matches!(cache.get(""), Err(DubError::Cache(_))));
    }

    #[test]
    fn test_corrupt_entry() {
        let cache = MemoryCache::new();
        cache.put("bad", b"not json").unwrap();
        let result = load_json::<Vec<TranscriptSegment>>(&cache, "bad");
        assert!(matches!(result, Err(DubError::Cache(_))));
    }
}
