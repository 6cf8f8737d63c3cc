use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use super::leaf::LeafRef;
use super::path::RepoPath;

/// Explicit owner/repository identity for a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner_id: String,
    pub repo_id: String,
}

impl RepoRef {
    pub fn new(owner_id: impl Into<String>, repo_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            repo_id: repo_id.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.repo_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Local,
    Remote,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNode {
    Directory(Directory),
    File(FileNode),
}

impl TreeNode {
    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory(_))
    }
}

/// A directory level. Clone, equality and drop run on explicit stacks, so
/// nesting depth is bounded by memory rather than by the thread stack.
#[derive(Debug, Default)]
pub struct Directory {
    pub children: BTreeMap<String, TreeNode>,
}

impl Directory {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Clone for Directory {
    fn clone(&self) -> Self {
        // (children left to copy, copy being built, name in the parent copy)
        let mut stack: Vec<(btree_map::Iter<'_, String, TreeNode>, Directory, Option<&String>)> =
            vec![(self.children.iter(), Directory::default(), None)];
        let mut finished = Directory::default();
        while let Some(top) = stack.last_mut() {
            match top.0.next() {
                Some((name, TreeNode::File(file))) => {
                    top.1.children.insert(name.clone(), TreeNode::File(file.clone()));
                }
                Some((name, TreeNode::Directory(dir))) => {
                    stack.push((dir.children.iter(), Directory::default(), Some(name)));
                }
                None => {
                    let Some((_, done, name)) = stack.pop() else {
                        break;
                    };
                    match (stack.last_mut(), name) {
                        (Some(parent), Some(name)) => {
                            parent.1.children.insert(name.clone(), TreeNode::Directory(done));
                        }
                        _ => finished = done,
                    }
                }
            }
        }
        finished
    }
}

impl PartialEq for Directory {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((left, right)) = pending.pop() {
            if left.children.len() != right.children.len() {
                return false;
            }
            for ((left_name, left_node), (right_name, right_node)) in
                left.children.iter().zip(&right.children)
            {
                if left_name != right_name {
                    return false;
                }
                match (left_node, right_node) {
                    (TreeNode::File(l), TreeNode::File(r)) if l == r => {}
                    (TreeNode::Directory(l), TreeNode::Directory(r)) => pending.push((l, r)),
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for Directory {}

impl Drop for Directory {
    fn drop(&mut self) {
        if self.children.is_empty() {
            return;
        }
        let mut pending = vec![std::mem::take(&mut self.children)];
        while let Some(children) = pending.pop() {
            for node in children.into_values() {
                if let TreeNode::Directory(mut dir) = node {
                    pending.push(std::mem::take(&mut dir.children));
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNode {
    pub content: LeafRef,
}

/// Root directory plus the identity and origin of its leaves.
///
/// Built once and replaced wholesale; never mutated in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryTree {
    pub(crate) root: Directory,
    pub(crate) repo: RepoRef,
    pub(crate) origin: Origin,
}

impl RepositoryTree {
    pub fn empty(repo: RepoRef, origin: Origin) -> Self {
        Self {
            root: Directory::default(),
            repo,
            origin,
        }
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn owner_id(&self) -> &str {
        &self.repo.owner_id
    }

    pub fn repo_id(&self) -> &str {
        &self.repo.repo_id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Look up the node at `path`.
    pub fn get(&self, path: &RepoPath) -> Option<&TreeNode> {
        let (last, parents) = path.segments().split_last()?;
        let mut dir = &self.root;
        for segment in parents {
            match dir.children.get(segment)? {
                TreeNode::Directory(d) => dir = d,
                TreeNode::File(_) => return None,
            }
        }
        dir.children.get(last)
    }

    pub fn leaf(&self, path: &RepoPath) -> Option<&LeafRef> {
        match self.get(path)? {
            TreeNode::File(f) => Some(&f.content),
            TreeNode::Directory(_) => None,
        }
    }
}
