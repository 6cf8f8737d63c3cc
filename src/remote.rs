//! Remote store boundary: list, upload, fetch.

use crate::error::Result;
use crate::model::{RemoteListing, RepoPath, RepoRef};

mod http_client;
mod memory;

pub use self::http_client::HttpRemoteStore;
pub use self::memory::MemoryRemoteStore;

/// One file of an upload batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadEntry {
    pub path: RepoPath,
    pub bytes: Vec<u8>,
}

/// The three remote operations the content tree depends on.
///
/// Implementations surface transport problems as `Error::Network` and never
/// cache on behalf of callers.
pub trait RemoteStore: Send + Sync {
    /// Full listing of the repository's uploaded files.
    fn list_tree(&self, repo: &RepoRef) -> Result<RemoteListing>;

    /// Replace the repository's content with `entries`. A path repeated in
    /// the batch keeps its last bytes.
    fn upload_batch(&self, repo: &RepoRef, entries: &[UploadEntry]) -> Result<()>;

    fn fetch_object(&self, repo: &RepoRef, path: &RepoPath) -> Result<Vec<u8>>;
}
