//! Export of a whole tree as one tar archive.
//!
//! Leaves that fail to resolve are replaced by a `<path>.error.txt` entry and
//! reported; they never abort the export.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use crate::error::{Error, NetworkError, Result};
use crate::model::{LeafRef, RepoPath, RepositoryTree, TreeNode};
use crate::resolver::ContentResolver;

pub const PLACEHOLDER_SUFFIX: &str = ".error.txt";
pub const PLACEHOLDER_MESSAGE: &str = "Failed to fetch file from server.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveFailure {
    pub path: RepoPath,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct ArchiveReport {
    pub dirs: u64,
    pub files: u64,
    pub failures: Vec<ArchiveFailure>,
}

/// In-memory archive plus the leaves that were degraded.
#[derive(Clone, Debug)]
pub struct ArchiveResult {
    pub bytes: Vec<u8>,
    pub failures: Vec<ArchiveFailure>,
}

enum Planned {
    /// Entry name of a directory.
    Dir(String),
    File { index: usize, path: RepoPath },
}

pub struct ArchiveBuilder {
    resolver: ContentResolver,
    workers: usize,
    mtime: u64,
}

impl ArchiveBuilder {
    pub fn new(resolver: ContentResolver) -> Self {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        Self {
            resolver,
            workers: 1,
            mtime: u64::try_from(now).unwrap_or_default(),
        }
    }

    /// Resolve up to `workers` leaves concurrently. Output order is fixed by
    /// the tree, not by completion.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Modification time stamped on every entry, in Unix seconds.
    pub fn mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    pub fn build(&self, tree: &RepositoryTree) -> Result<ArchiveResult> {
        let (bytes, report) = self.write_to(tree, Vec::new())?;
        Ok(ArchiveResult {
            bytes,
            failures: report.failures,
        })
    }

    /// Stream the archive into `sink` and hand the sink back once finalized.
    pub fn write_to<W: Write>(
        &self,
        tree: &RepositoryTree,
        sink: W,
    ) -> Result<(W, ArchiveReport)> {
        if tree.is_empty() {
            return Err(Error::EmptyTree);
        }

        let mut plan = Vec::new();
        let mut leaves = Vec::new();
        for entry in tree.walk() {
            match entry.node {
                TreeNode::Directory(_) => plan.push(Planned::Dir(entry.path.to_slash_string())),
                TreeNode::File(file) => {
                    plan.push(Planned::File {
                        index: leaves.len(),
                        path: entry.path,
                    });
                    leaves.push(&file.content);
                }
            }
        }

        let mut writer = EntryWriter {
            builder: tar::Builder::new(sink),
            mtime: self.mtime,
            taken: plan
                .iter()
                .map(|item| match item {
                    Planned::Dir(name) => name.clone(),
                    Planned::File { path, .. } => path.to_slash_string(),
                })
                .collect(),
            report: ArchiveReport::default(),
        };

        if self.workers <= 1 || leaves.len() <= 1 {
            writer.emit(&plan, &mut |index| self.resolver.resolve(leaves[index]))?;
        } else {
            self.emit_pooled(&plan, &leaves, &mut writer)?;
        }

        let EntryWriter {
            builder, report, ..
        } = writer;
        let sink = builder.into_inner().map_err(Error::Archive)?;
        tracing::info!(
            dirs = report.dirs,
            files = report.files,
            failed = report.failures.len(),
            "archive finished"
        );
        Ok((sink, report))
    }

    fn emit_pooled<W: Write>(
        &self,
        plan: &[Planned],
        leaves: &[&LeafRef],
        writer: &mut EntryWriter<W>,
    ) -> Result<()> {
        let next = AtomicUsize::new(0);
        let workers = self.workers.min(leaves.len());

        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::sync_channel::<(usize, Result<Vec<u8>>)>(workers);
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let resolver = &self.resolver;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(leaf) = leaves.get(index) else {
                            break;
                        };
                        if tx.send((index, resolver.resolve(leaf))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Completion order is arbitrary; park results until their turn.
            let mut parked: BTreeMap<usize, Result<Vec<u8>>> = BTreeMap::new();
            writer.emit(plan, &mut |index| {
                loop {
                    if let Some(result) = parked.remove(&index) {
                        return result;
                    }
                    match rx.recv() {
                        Ok((done, result)) => {
                            parked.insert(done, result);
                        }
                        Err(_) => {
                            return Err(NetworkError::Transport(
                                "resolver worker exited".to_string(),
                            )
                            .into());
                        }
                    }
                }
            })
        })
    }
}

struct EntryWriter<W: Write> {
    builder: tar::Builder<W>,
    mtime: u64,
    /// Entry names already in use, so placeholders never shadow real files.
    taken: HashSet<String>,
    report: ArchiveReport,
}

impl<W: Write> EntryWriter<W> {
    fn emit(
        &mut self,
        plan: &[Planned],
        resolve: &mut dyn FnMut(usize) -> Result<Vec<u8>>,
    ) -> Result<()> {
        for item in plan {
            match item {
                Planned::Dir(name) => {
                    self.append_dir(name)?;
                    self.report.dirs += 1;
                }
                Planned::File { index, path } => match resolve(*index) {
                    Ok(bytes) => {
                        self.append_file(&path.to_slash_string(), &bytes)?;
                        self.report.files += 1;
                    }
                    Err(err) => {
                        tracing::warn!(path = %path, error = %err, "leaf degraded to placeholder");
                        let name = self.placeholder_name(path);
                        let body = format!("{}\n{}\n", PLACEHOLDER_MESSAGE, err);
                        self.append_file(&name, body.as_bytes())?;
                        self.report.failures.push(ArchiveFailure {
                            path: path.clone(),
                            reason: err.to_string(),
                        });
                    }
                },
            }
        }
        Ok(())
    }

    fn placeholder_name(&mut self, path: &RepoPath) -> String {
        let base = path.to_slash_string();
        let mut name = format!("{}{}", base, PLACEHOLDER_SUFFIX);
        let mut n = 1;
        while !self.taken.insert(name.clone()) {
            name = format!("{}.{}{}", base, n, PLACEHOLDER_SUFFIX);
            n += 1;
        }
        name
    }

    fn append_dir(&mut self, name: &str) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        header.set_mtime(self.mtime);
        self.builder
            .append_data(&mut header, format!("{}/", name), io::empty())
            .map_err(Error::Archive)
    }

    fn append_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(bytes.len() as u64);
        header.set_mtime(self.mtime);
        self.builder
            .append_data(&mut header, name, bytes)
            .map_err(Error::Archive)
    }
}

#[cfg(test)]
#[path = "tests/archive_tests.rs"]
mod tests;
