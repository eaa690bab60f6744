//! In-memory representation cache, validated against file modification time.

use crate::compress::{self, Encoding};
use crate::error::ServeError;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncReadExt;

type CacheKey = (PathBuf, Encoding);

struct CacheEntry {
    payload: Arc<Vec<u8>>,
    modified: SystemTime,
}

/// Payloads keyed by `(path, encoding)`. Entries are rebuilt lazily when the
/// file's mtime no longer matches the one they were built from.
///
/// Growth is unbounded.
#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<FxHashMap<CacheKey, CacheEntry>>,
    // One async lock per key being rebuilt, so concurrent misses read the
    // file once.
    building: Mutex<FxHashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Payload for `path` in the given encoding, as of `modified`.
    pub async fn get(
        &self,
        path: &Path,
        encoding: Encoding,
        modified: SystemTime,
    ) -> Result<Arc<Vec<u8>>, ServeError> {
        let key = (path.to_path_buf(), encoding);
        if let Some(payload) = self.lookup(&key, modified) {
            return Ok(payload);
        }

        let build_lock = self.building.lock().entry(key.clone()).or_default().clone();
        let result = {
            let _guard = build_lock.lock().await;
            match self.lookup(&key, modified) {
                Some(payload) => Ok(payload),
                None => self.rebuild(key.clone(), modified).await,
            }
        };

        // Drop the build lock once no other request is waiting on it.
        let mut building = self.building.lock();
        let idle = building
            .get(&key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &build_lock) && Arc::strong_count(lock) <= 2);
        if idle {
            building.remove(&key);
        }
        drop(building);

        result
    }

    fn lookup(&self, key: &CacheKey, modified: SystemTime) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.modified == modified)
            .map(|entry| Arc::clone(&entry.payload))
    }

    async fn rebuild(&self, key: CacheKey, modified: SystemTime) -> Result<Arc<Vec<u8>>, ServeError> {
        let mut file = tokio::fs::File::open(&key.0).await?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw).await?;
        // A write that lands between the caller's stat and this read must not
        // be stored under the older mtime.
        let settled = file.metadata().await?.modified().ok() == Some(modified);

        let payload = match key.1 {
            Encoding::Identity => raw,
            Encoding::Gzip => tokio::task::spawn_blocking(move || compress::gzip(&raw))
                .await
                .map_err(|e| ServeError::Io(std::io::Error::other(e)))??,
        };

        let payload = Arc::new(payload);
        if !settled {
            log::debug!("{} changed while being read, not cached", key.0.display());
            return Ok(payload);
        }
        log::debug!("cached {} ({:?}, {} bytes)", key.0.display(), key.1, payload.len());
        self.entries.write().insert(
            key,
            CacheEntry {
                payload: Arc::clone(&payload),
                modified,
            },
        );
        Ok(payload)
    }
}
