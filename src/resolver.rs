//! On-demand resolution of leaf content.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{NetworkError, Result};
use crate::model::{LeafRef, RemoteObject, RepoPath, RepoRef};
use crate::remote::RemoteStore;

type CacheKey = (RepoRef, RepoPath);

/// Resolved remote content keyed by `(owner, repo, path)`.
///
/// Cloning shares the same cache. The sync coordinator clears a repository's
/// entries after every successful save.
#[derive(Clone, Default)]
pub struct ContentCache {
    entries: Arc<Mutex<HashMap<CacheKey, Arc<[u8]>>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<[u8]>>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        self.lock().get(key).cloned()
    }

    fn insert(&self, key: CacheKey, bytes: Arc<[u8]>) {
        self.lock().insert(key, bytes);
    }

    pub fn invalidate_repo(&self, repo: &RepoRef) {
        self.lock().retain(|(cached, _), _| cached != repo);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Produces the bytes behind a leaf, from memory or from the remote store.
///
/// Without a cache every remote resolve performs a fetch. Calls are
/// independent and may run concurrently.
#[derive(Clone)]
pub struct ContentResolver {
    store: Arc<dyn RemoteStore>,
    cache: Option<ContentCache>,
}

impl ContentResolver {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store, cache: None }
    }

    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn resolve(&self, leaf: &LeafRef) -> Result<Vec<u8>> {
        match leaf {
            LeafRef::LocalBlob(blob) => blob.read(),
            LeafRef::RemoteObject(object) => self.resolve_remote(object),
        }
    }

    /// Lossy UTF-8 rendering of a leaf, for viewers.
    pub fn preview(&self, leaf: &LeafRef) -> Result<String> {
        let bytes = self.resolve(leaf)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn resolve_remote(&self, object: &RemoteObject) -> Result<Vec<u8>> {
        let repo = RepoRef::new(object.owner_id.clone(), object.repo_id.clone());
        let key = (repo, object.path.clone());
        if let Some(bytes) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            return Ok(bytes.to_vec());
        }

        let bytes = self.store.fetch_object(&key.0, &object.path)?;
        if let Some(expected) = &object.digest {
            let actual = blake3::hash(&bytes).to_hex().to_string();
            if &actual != expected {
                return Err(NetworkError::Integrity {
                    path: object.path.clone(),
                    expected: expected.clone(),
                    actual,
                }
                .into());
            }
        }

        if let Some(cache) = &self.cache {
            cache.insert(key, Arc::from(bytes.as_slice()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
#[path = "tests/resolver_tests.rs"]
mod tests;
