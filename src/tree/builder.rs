use std::collections::btree_map::Entry;

use crate::error::ValidationError;
use crate::model::{
    Directory, FileNode, LeafRef, Origin, RemoteListing, RemoteObject, RepoPath, RepoRef,
    RepositoryTree, TreeNode,
};

/// Incremental form of [`build`].
pub struct TreeBuilder {
    tree: RepositoryTree,
}

impl TreeBuilder {
    pub fn new(repo: RepoRef, origin: Origin) -> Self {
        Self {
            tree: RepositoryTree::empty(repo, origin),
        }
    }

    pub fn insert(&mut self, path: RepoPath, leaf: LeafRef) -> Result<(), ValidationError> {
        let matches_origin = match self.tree.origin {
            Origin::Local => leaf.is_local(),
            Origin::Remote => leaf.is_remote(),
        };
        if !matches_origin {
            return Err(ValidationError::MixedOrigin { path });
        }

        let mut dir: &mut Directory = &mut self.tree.root;
        for (depth, segment) in path.parent_segments().iter().enumerate() {
            let node = dir
                .children
                .entry(segment.clone())
                .or_insert_with(|| TreeNode::Directory(Directory::default()));
            dir = match node {
                TreeNode::Directory(d) => d,
                TreeNode::File(_) => {
                    return Err(ValidationError::ConflictingNodeKind {
                        path: path.prefix(depth + 1),
                    });
                }
            };
        }

        match dir.children.entry(path.name().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(TreeNode::File(FileNode { content: leaf }));
                Ok(())
            }
            Entry::Occupied(existing) => match existing.get() {
                TreeNode::Directory(_) => Err(ValidationError::ConflictingNodeKind { path }),
                TreeNode::File(_) => Err(ValidationError::DuplicatePath { path }),
            },
        }
    }

    pub fn finish(self) -> RepositoryTree {
        self.tree
    }
}

/// Build a tree from flat `(path, leaf)` entries.
///
/// The resulting shape does not depend on entry order. Any conflict fails the
/// whole build.
pub fn build<I>(
    repo: RepoRef,
    origin: Origin,
    entries: I,
) -> Result<RepositoryTree, ValidationError>
where
    I: IntoIterator<Item = (RepoPath, LeafRef)>,
{
    let mut builder = TreeBuilder::new(repo, origin);
    for (path, leaf) in entries {
        builder.insert(path, leaf)?;
    }
    Ok(builder.finish())
}

/// Build a remote-origin tree from a validated listing.
pub fn from_listing(
    repo: &RepoRef,
    listing: RemoteListing,
) -> Result<RepositoryTree, ValidationError> {
    let entries = listing.into_entries().into_iter().map(|entry| {
        let leaf = LeafRef::RemoteObject(RemoteObject {
            owner_id: repo.owner_id.clone(),
            repo_id: repo.repo_id.clone(),
            path: entry.path.clone(),
            digest: entry.marker.blake3,
        });
        (entry.path, leaf)
    });
    build(repo.clone(), Origin::Remote, entries)
}

#[cfg(test)]
#[path = "../tests/tree/builder_tests.rs"]
mod tests;
