use std::collections::{BTreeSet, btree_map};
use std::fmt::Write as _;

use crate::model::{Directory, LeafRef, RepoPath, RepositoryTree, TreeNode};

pub struct WalkEntry<'a> {
    pub path: RepoPath,
    pub node: &'a TreeNode,
}

/// Pre-order traversal in name order, driven by an explicit stack.
///
/// One frame per open directory; the names of the open directories are held
/// once in `prefix` and copied only into the paths handed out.
pub struct Walk<'a> {
    frames: Vec<btree_map::Iter<'a, String, TreeNode>>,
    prefix: Vec<String>,
}

impl<'a> Walk<'a> {
    fn new(root: &'a Directory) -> Self {
        Self {
            frames: vec![root.children.iter()],
            prefix: Vec::new(),
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frames.last_mut()?;
            let Some((name, node)) = frame.next() else {
                self.frames.pop();
                self.prefix.pop();
                continue;
            };

            let mut segments = Vec::with_capacity(self.prefix.len() + 1);
            segments.extend_from_slice(&self.prefix);
            segments.push(name.clone());
            if let TreeNode::Directory(dir) = node {
                self.prefix.push(name.clone());
                self.frames.push(dir.children.iter());
            }
            return Some(WalkEntry {
                path: RepoPath::from_trusted(segments),
                node,
            });
        }
    }
}

/// Every node below `root`, pre-order, without building paths.
fn nodes(root: &Directory) -> impl Iterator<Item = &TreeNode> {
    let mut frames = vec![root.children.values()];
    std::iter::from_fn(move || {
        loop {
            let node = frames.last_mut()?.next();
            match node {
                Some(node) => {
                    if let TreeNode::Directory(dir) = node {
                        frames.push(dir.children.values());
                    }
                    return Some(node);
                }
                None => {
                    frames.pop();
                }
            }
        }
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub files: u64,
    pub dirs: u64,
}

impl RepositoryTree {
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(&self.root)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (RepoPath, &LeafRef)> + '_ {
        self.walk().filter_map(|entry| match entry.node {
            TreeNode::File(f) => Some((entry.path, &f.content)),
            TreeNode::Directory(_) => None,
        })
    }

    pub fn leaf_paths(&self) -> BTreeSet<RepoPath> {
        self.leaves().map(|(path, _)| path).collect()
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for node in nodes(&self.root) {
            match node {
                TreeNode::Directory(_) => stats.dirs += 1,
                TreeNode::File(_) => stats.files += 1,
            }
        }
        stats
    }

    /// Indented listing, directories suffixed with `/`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in self.walk() {
            let indent = "  ".repeat(entry.path.depth() - 1);
            let suffix = if entry.node.is_dir() { "/" } else { "" };
            let _ = writeln!(out, "{}{}{}", indent, entry.path.name(), suffix);
        }
        out
    }
}

#[cfg(test)]
#[path = "../tests/tree/walk_tests.rs"]
mod tests;
