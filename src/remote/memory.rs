use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use super::{RemoteStore, UploadEntry};
use crate::error::{NetworkError, Result};
use crate::model::{LeafMarker, ListingEntry, RemoteListing, RepoPath, RepoRef};

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    digest: String,
}

/// Blocks callers while held and counts how many reached it.
#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Default)]
struct GateState {
    held: bool,
    entered: usize,
}

impl Gate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_held(&self, held: bool) {
        self.lock().held = held;
        self.changed.notify_all();
    }

    fn pass(&self) {
        let mut state = self.lock();
        state.entered += 1;
        self.changed.notify_all();
        while state.held {
            state = self.changed.wait(state).unwrap_or_else(|p| p.into_inner());
        }
    }

    fn wait_entered(&self, n: usize) {
        let mut state = self.lock();
        while state.entered < n {
            state = self.changed.wait(state).unwrap_or_else(|p| p.into_inner());
        }
    }
}

/// In-process remote store with fault injection, for tests and offline use.
#[derive(Default)]
pub struct MemoryRemoteStore {
    repos: Mutex<HashMap<RepoRef, BTreeMap<RepoPath, StoredObject>>>,
    failing_fetches: Mutex<HashSet<RepoPath>>,
    fail_list: AtomicBool,
    fail_upload: AtomicBool,
    list_gate: Gate,
    upload_gate: Gate,
    list_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

fn unavailable(what: &str) -> crate::error::Error {
    NetworkError::Transport(format!("{}: remote unavailable", what)).into()
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn repos(&self) -> MutexGuard<'_, HashMap<RepoRef, BTreeMap<RepoPath, StoredObject>>> {
        self.repos.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Store one object directly, bypassing upload semantics.
    pub fn seed(&self, repo: &RepoRef, path: RepoPath, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        let digest = blake3::hash(&bytes).to_hex().to_string();
        self.repos()
            .entry(repo.clone())
            .or_default()
            .insert(path, StoredObject { bytes, digest });
    }

    /// Replace stored bytes while keeping the advertised digest.
    pub fn tamper(&self, repo: &RepoRef, path: &RepoPath, bytes: impl Into<Vec<u8>>) {
        if let Some(object) = self
            .repos()
            .get_mut(repo)
            .and_then(|files| files.get_mut(path))
        {
            object.bytes = bytes.into();
        }
    }

    pub fn fail_fetch(&self, path: RepoPath) {
        self.failing_fetches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(path);
    }

    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    /// While held, `list_tree` calls block after being counted.
    pub fn hold_listings(&self, held: bool) {
        self.list_gate.set_held(held);
    }

    /// While held, `upload_batch` calls block after being counted.
    pub fn hold_uploads(&self, held: bool) {
        self.upload_gate.set_held(held);
    }

    pub fn wait_for_listings(&self, n: usize) {
        self.list_gate.wait_entered(n);
    }

    pub fn wait_for_uploads(&self, n: usize) {
        self.upload_gate.wait_entered(n);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self, repo: &RepoRef) -> Vec<RepoPath> {
        self.repos()
            .get(repo)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn list_tree(&self, repo: &RepoRef) -> Result<RemoteListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list_gate.pass();
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(unavailable("list tree"));
        }
        let entries = self
            .repos()
            .get(repo)
            .map(|files| {
                files
                    .iter()
                    .map(|(path, object)| ListingEntry {
                        path: path.clone(),
                        marker: LeafMarker {
                            key: None,
                            size: Some(object.bytes.len() as u64),
                            blake3: Some(object.digest.clone()),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(RemoteListing::new(entries))
    }

    fn upload_batch(&self, repo: &RepoRef, entries: &[UploadEntry]) -> Result<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.upload_gate.pass();
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(unavailable("upload batch"));
        }
        let mut files = BTreeMap::new();
        for entry in entries {
            let digest = blake3::hash(&entry.bytes).to_hex().to_string();
            files.insert(
                entry.path.clone(),
                StoredObject {
                    bytes: entry.bytes.clone(),
                    digest,
                },
            );
        }
        self.repos().insert(repo.clone(), files);
        Ok(())
    }

    fn fetch_object(&self, repo: &RepoRef, path: &RepoPath) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_fetches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(path)
        {
            return Err(unavailable(&format!("fetch {}", path)));
        }
        self.repos()
            .get(repo)
            .and_then(|files| files.get(path))
            .map(|object| object.bytes.clone())
            .ok_or_else(|| {
                NetworkError::Status {
                    status: 404,
                    message: format!("fetch object: {} not found", path),
                }
                .into()
            })
    }
}
