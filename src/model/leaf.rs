use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::path::RepoPath;
use crate::error::{Error, Result};

/// Content held by a leaf of the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafRef {
    LocalBlob(LocalBlob),
    RemoteObject(RemoteObject),
}

impl LeafRef {
    pub fn is_local(&self) -> bool {
        matches!(self, LeafRef::LocalBlob(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, LeafRef::RemoteObject(_))
    }
}

/// Reference to content persisted by the remote store.
///
/// Never carries bytes. `digest` is the blake3 hex advertised by the listing,
/// when there is one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteObject {
    pub owner_id: String,
    pub repo_id: String,
    pub path: RepoPath,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Liveness flag shared by every blob of one staged batch.
#[derive(Clone, Debug)]
pub struct BatchHandle(Arc<AtomicBool>);

impl BatchHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate every blob of the batch. Idempotent.
    pub fn retire(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn same_batch(&self, other: &BatchHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for BatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the bytes of a local blob come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobSource {
    Memory(Arc<[u8]>),
    /// Read lazily from disk on every access.
    File(PathBuf),
}

/// Not-yet-persisted file content staged for upload.
#[derive(Clone, Debug)]
pub struct LocalBlob {
    name: String,
    source: BlobSource,
    batch: BatchHandle,
}

impl LocalBlob {
    pub fn new(name: impl Into<String>, source: BlobSource, batch: BatchHandle) -> Self {
        Self {
            name: name.into(),
            source,
            batch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &BlobSource {
        &self.source
    }

    pub fn batch(&self) -> &BatchHandle {
        &self.batch
    }

    /// Read the whole blob. Fails with `StaleHandle` once the batch is retired
    /// or the backing file disappeared.
    pub fn read(&self) -> Result<Vec<u8>> {
        if !self.batch.is_live() {
            return Err(self.stale());
        }
        match &self.source {
            BlobSource::Memory(bytes) => Ok(bytes.to_vec()),
            BlobSource::File(path) => match std::fs::read(path) {
                Ok(bytes) => Ok(bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(self.stale()),
                Err(source) => Err(Error::Io {
                    path: path.display().to_string(),
                    source,
                }),
            },
        }
    }

    fn stale(&self) -> Error {
        Error::StaleHandle {
            name: self.name.clone(),
        }
    }
}

// Batch identity is not part of a blob's value.
impl PartialEq for LocalBlob {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.source == other.source
    }
}

impl Eq for LocalBlob {}
