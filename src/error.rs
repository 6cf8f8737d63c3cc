//! Error taxonomy for the repository content tree.

use crate::model::RepoPath;

/// Malformed or conflicting path structure, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("path is empty")]
    EmptyPath,

    #[error("empty segment in path {path:?}")]
    EmptySegment { path: String },

    #[error("reserved segment {segment:?} in path {path:?}")]
    ReservedSegment { path: String, segment: String },

    /// A single segment carries a path separator of its own.
    #[error("separator inside segment {segment:?} in path {path:?}")]
    SeparatorInSegment { path: String, segment: String },

    /// A name resolves to a directory in one entry and to a file in another.
    #[error("conflicting node kind at {path}")]
    ConflictingNodeKind { path: RepoPath },

    #[error("duplicate path {path}")]
    DuplicatePath { path: RepoPath },

    /// A leaf does not belong to the origin declared for the tree.
    #[error("leaf at {path} does not match the tree origin")]
    MixedOrigin { path: RepoPath },

    #[error("invalid exclude pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("malformed listing at {path:?}: {reason}")]
    MalformedListing { path: String, reason: String },
}

/// Transport failure while talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Fetched bytes do not hash to the digest advertised by the listing.
    #[error("content hash mismatch for {path} (expected {expected}, got {actual})")]
    Integrity {
        path: RepoPath,
        expected: String,
        actual: String,
    },

    #[error("cannot decode remote response: {0}")]
    Decode(String),
}

impl NetworkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetworkError::Status { status: 404, .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("a save is already in flight for {owner_id}/{repo_id}")]
    ConcurrentSave { owner_id: String, repo_id: String },

    /// A local blob was read after its staged batch was superseded.
    #[error("local file {name:?} is no longer readable (batch superseded)")]
    StaleHandle { name: String },

    #[error("tree has no entries")]
    EmptyTree,

    #[error("nothing staged to save")]
    NotLocal,

    /// A remote listing arrived after a newer tree replaced the working tree.
    #[error("remote listing superseded by a newer working tree")]
    Superseded,

    #[error("archive error: {0}")]
    Archive(#[source] std::io::Error),

    #[error("I/O error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
