//! On-disk layout: `<data-dir>/repos/<owner>/<repo>/files/<path>`.

use std::fs;
use std::path::Path as FsPath;
use std::sync::atomic::Ordering;

use repotree::model::{LeafMarker, ListingEntry, RemoteListing, RepoPath};

use super::*;

pub(super) fn repo_dir(state: &AppState, owner: &str, repo: &str) -> PathBuf {
    state.data_dir.join("repos").join(owner).join(repo)
}

pub(super) fn files_dir(state: &AppState, owner: &str, repo: &str) -> PathBuf {
    repo_dir(state, owner, repo).join("files")
}

pub(super) fn object_path(root: &FsPath, path: &RepoPath) -> PathBuf {
    let mut out = root.to_path_buf();
    for segment in path.segments() {
        out.push(segment);
    }
    out
}

/// Walk a repository's files and describe each one.
pub(super) fn scan_listing(root: &FsPath) -> Result<RemoteListing> {
    let mut entries = Vec::new();
    let mut stack: Vec<(PathBuf, Vec<String>)> = vec![(root.to_path_buf(), Vec::new())];
    while let Some((dir, prefix)) = stack.pop() {
        for entry in fs::read_dir(&dir).with_context(|| format!("read dir {}", dir.display()))? {
            let entry = entry?;
            let mut segments = prefix.clone();
            segments.push(entry.file_name().to_string_lossy().into_owned());
            let ft = entry.file_type()?;
            if ft.is_dir() {
                stack.push((entry.path(), segments));
            } else if ft.is_file() {
                let bytes = fs::read(entry.path())
                    .with_context(|| format!("read {}", entry.path().display()))?;
                entries.push(ListingEntry {
                    path: RepoPath::from_segments(segments)?,
                    marker: LeafMarker {
                        key: None,
                        size: Some(bytes.len() as u64),
                        blake3: Some(blake3::hash(&bytes).to_hex().to_string()),
                    },
                });
            }
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(RemoteListing::new(entries))
}

/// Write a batch next to the current content, then swap it in.
pub(super) fn replace_content(
    state: &AppState,
    owner: &str,
    repo: &str,
    files: &[(RepoPath, axum::body::Bytes)],
) -> Result<()> {
    let base = repo_dir(state, owner, repo);
    let seq = state.staging_seq.fetch_add(1, Ordering::Relaxed);
    let incoming = base.join(format!("incoming.{}", seq));
    let retired = base.join(format!("retired.{}", seq));

    fs::create_dir_all(&incoming).with_context(|| format!("create {}", incoming.display()))?;
    for (path, bytes) in files {
        let target = object_path(&incoming, path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        fs::write(&target, bytes).with_context(|| format!("write {}", target.display()))?;
    }

    let current = files_dir(state, owner, repo);
    if current.exists() {
        fs::rename(&current, &retired)
            .with_context(|| format!("rename {} -> {}", current.display(), retired.display()))?;
    }
    fs::rename(&incoming, &current)
        .with_context(|| format!("rename {} -> {}", incoming.display(), current.display()))?;
    if retired.exists() {
        fs::remove_dir_all(&retired)
            .with_context(|| format!("remove dir {}", retired.display()))?;
    }
    Ok(())
}
