//! Working-tree ownership for one repository-viewing session.
//!
//! State machine:
//!
//! ```text
//! Empty --load_remote--> Remote
//! Empty | Remote | Local --stage_local--> Local
//! Local --save--> Saving --ok--> Remote
//!                        --err--> Local (unchanged)
//! ```
//!
//! Every installed tree bumps a generation counter. A listing that arrives
//! after the generation it started from was superseded is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result, ValidationError};
use crate::local::LocalBatch;
use crate::model::{BatchHandle, LeafRef, Origin, RepoRef, RepositoryTree};
use crate::remote::{RemoteStore, UploadEntry};
use crate::resolver::{ContentCache, ContentResolver};
use crate::tree;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Remote,
    Local,
    Saving,
}

#[derive(Default)]
struct Working {
    tree: Option<Arc<RepositoryTree>>,
    batch: Option<BatchHandle>,
    generation: u64,
}

struct SaveGuard<'a>(&'a AtomicBool);

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncCoordinator {
    repo: RepoRef,
    store: Arc<dyn RemoteStore>,
    cache: Option<ContentCache>,
    working: Mutex<Working>,
    saving: AtomicBool,
}

impl SyncCoordinator {
    pub fn new(repo: RepoRef, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            repo,
            store,
            cache: None,
            working: Mutex::new(Working::default()),
            saving: AtomicBool::new(false),
        }
    }

    /// Share `cache` with resolvers; it is cleared for this repository after
    /// every successful save.
    pub fn with_cache(mut self, cache: ContentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// A resolver over the same store and cache.
    pub fn resolver(&self) -> ContentResolver {
        let resolver = ContentResolver::new(self.store.clone());
        match &self.cache {
            Some(cache) => resolver.with_cache(cache.clone()),
            None => resolver,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Working> {
        self.working.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn current(&self) -> Option<Arc<RepositoryTree>> {
        self.lock().tree.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn state(&self) -> SessionState {
        if self.saving.load(Ordering::Acquire) {
            return SessionState::Saving;
        }
        match self.lock().tree.as_deref().map(RepositoryTree::origin) {
            None => SessionState::Empty,
            Some(Origin::Remote) => SessionState::Remote,
            Some(Origin::Local) => SessionState::Local,
        }
    }

    fn install(
        &self,
        working: &mut Working,
        tree: Arc<RepositoryTree>,
        batch: Option<BatchHandle>,
    ) {
        if let Some(previous) = working.batch.take()
            && !batch.as_ref().is_some_and(|b| b.same_batch(&previous))
        {
            previous.retire();
        }
        working.tree = Some(tree);
        working.batch = batch;
        working.generation += 1;
    }

    fn fetch_remote_tree(&self) -> Result<RepositoryTree> {
        let listing = self.store.list_tree(&self.repo)?;
        let tree = tree::from_listing(&self.repo, listing)?;
        tracing::info!(repo = %self.repo, files = tree.stats().files, "loaded remote listing");
        Ok(tree)
    }

    /// Fetch the canonical remote snapshot and make it the working tree.
    ///
    /// On error the current tree is left untouched. A response overtaken by a
    /// newer `stage_local`, `save` or `load_remote` yields `Superseded`.
    pub fn load_remote(&self) -> Result<Arc<RepositoryTree>> {
        let started = self.lock().generation;
        let tree = self.fetch_remote_tree().inspect_err(|err| {
            tracing::warn!(repo = %self.repo, error = %err, "remote listing failed");
        })?;

        let mut working = self.lock();
        if working.generation != started || self.saving.load(Ordering::Acquire) {
            tracing::debug!(
                repo = %self.repo,
                started,
                current = working.generation,
                "discarding stale listing"
            );
            return Err(Error::Superseded);
        }
        let tree = Arc::new(tree);
        self.install(&mut working, tree.clone(), None);
        Ok(tree)
    }

    /// Replace the working tree with a local selection. The previous local
    /// batch, if any, becomes unreadable.
    pub fn stage_local(&self, batch: LocalBatch) -> Result<Arc<RepositoryTree>> {
        let (handle, entries) = batch.into_parts();
        let tree = Arc::new(tree::build(self.repo.clone(), Origin::Local, entries)?);
        let mut working = self.lock();
        self.install(&mut working, tree.clone(), Some(handle));
        tracing::info!(repo = %self.repo, files = tree.stats().files, "staged local selection");
        Ok(tree)
    }

    /// Upload the staged local tree, then adopt the remote listing.
    ///
    /// At most one save runs at a time; a concurrent call fails with
    /// `ConcurrentSave` without touching the store. On failure the local tree
    /// stays in place.
    pub fn save(&self) -> Result<Arc<RepositoryTree>> {
        if self
            .saving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ConcurrentSave {
                owner_id: self.repo.owner_id.clone(),
                repo_id: self.repo.repo_id.clone(),
            });
        }
        let _guard = SaveGuard(&self.saving);

        let (local, started) = {
            let mut working = self.lock();
            let local = match &working.tree {
                Some(tree) if tree.origin() == Origin::Local => tree.clone(),
                _ => return Err(Error::NotLocal),
            };
            if local.is_empty() {
                return Err(Error::EmptyTree);
            }
            working.generation += 1;
            (local, working.generation)
        };

        let entries = upload_entries(&local)?;
        tracing::info!(repo = %self.repo, files = entries.len(), "uploading batch");
        self.store
            .upload_batch(&self.repo, &entries)
            .inspect_err(|err| tracing::warn!(repo = %self.repo, error = %err, "upload failed"))?;

        if let Some(cache) = &self.cache {
            cache.invalidate_repo(&self.repo);
        }

        let remote = Arc::new(self.fetch_remote_tree().inspect_err(|err| {
            tracing::warn!(repo = %self.repo, error = %err, "refresh after upload failed");
        })?);

        let mut working = self.lock();
        if working.generation == started {
            self.install(&mut working, remote.clone(), None);
        } else {
            tracing::debug!(repo = %self.repo, "working tree replaced during save; keeping it");
        }
        tracing::info!(repo = %self.repo, files = remote.stats().files, "save finished");
        Ok(remote)
    }
}

fn upload_entries(tree: &RepositoryTree) -> Result<Vec<UploadEntry>> {
    tree.leaves()
        .map(|(path, leaf)| -> Result<UploadEntry> {
            match leaf {
                LeafRef::LocalBlob(blob) => Ok(UploadEntry {
                    bytes: blob.read()?,
                    path,
                }),
                LeafRef::RemoteObject(_) => Err(ValidationError::MixedOrigin { path }.into()),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
