//! Staging of a user's local file selection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result, ValidationError};
use crate::model::{BatchHandle, BlobSource, LeafRef, LocalBlob, RepoPath};

/// One selection of local files, all sharing a liveness handle.
#[derive(Debug, Default)]
pub struct LocalBatch {
    handle: BatchHandle,
    entries: Vec<(RepoPath, LocalBlob)>,
}

impl LocalBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> &BatchHandle {
        &self.handle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add_bytes(&mut self, path: RepoPath, bytes: impl Into<Vec<u8>>) {
        let bytes: Arc<[u8]> = bytes.into().into();
        self.push(path, BlobSource::Memory(bytes));
    }

    pub fn add_file(&mut self, path: RepoPath, file: impl Into<PathBuf>) {
        self.push(path, BlobSource::File(file.into()));
    }

    fn push(&mut self, path: RepoPath, source: BlobSource) {
        let blob = LocalBlob::new(path.name(), source, self.handle.clone());
        self.entries.push((path, blob));
    }

    /// Stage every regular file under `root`, keyed by its path relative to
    /// `root`. Paths matching any of `excludes` are skipped, directories
    /// included.
    pub fn from_dir(root: &Path, excludes: &[String]) -> Result<Self> {
        let excludes = compile_excludes(excludes)?;
        let mut batch = Self::new();
        let mut stack: Vec<(PathBuf, Vec<String>)> = vec![(root.to_path_buf(), Vec::new())];

        while let Some((dir, prefix)) = stack.pop() {
            let read = fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;
            for entry in read {
                let entry = entry.map_err(|source| io_error(&dir, source))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let mut segments = prefix.clone();
                segments.push(name);
                if excludes.is_match(segments.join("/")) {
                    continue;
                }

                let fs_path = entry.path();
                let file_type = entry
                    .file_type()
                    .map_err(|source| io_error(&fs_path, source))?;
                if file_type.is_dir() {
                    stack.push((fs_path, segments));
                } else if file_type.is_file() {
                    batch.add_file(RepoPath::from_segments(segments)?, fs_path);
                }
            }
        }

        batch.entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(batch)
    }

    pub fn entries(&self) -> &[(RepoPath, LocalBlob)] {
        &self.entries
    }

    pub(crate) fn into_parts(self) -> (BatchHandle, Vec<(RepoPath, LeafRef)>) {
        let entries = self
            .entries
            .into_iter()
            .map(|(path, blob)| (path, LeafRef::LocalBlob(blob)))
            .collect();
        (self.handle, entries)
    }
}

fn compile_excludes(patterns: &[String]) -> Result<GlobSet> {
    let invalid = |pattern: &str, err: globset::Error| ValidationError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    };
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| invalid(pattern, e))?);
    }
    Ok(builder.build().map_err(|e| invalid(&patterns.join(","), e))?)
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
