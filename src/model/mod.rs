mod config;
mod leaf;
mod listing;
mod path;
mod tree;

pub use self::config::{ArchiveConfig, ClientConfig, RemoteConfig};
pub use self::leaf::{BatchHandle, BlobSource, LeafRef, LocalBlob, RemoteObject};
pub use self::listing::{LEAF_MARKER, LeafMarker, ListResponse, ListingEntry, RemoteListing};
pub use self::path::RepoPath;
pub use self::tree::{Directory, FileNode, Origin, RepoRef, RepositoryTree, TreeNode};
