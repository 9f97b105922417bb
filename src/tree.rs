//! Snapshot model of a filesystem tree.
//!
//! A tree is captured once per sync endpoint as a flat list of [`Entry`]
//! values, each tagged with its path relative to the tree root and its node
//! kind. Entries are immutable snapshots; anything racing with the sync is
//! observed again through [`probe_kind`] at the point of use.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::ext::BestEffortPathExt;

/// The kind of a filesystem node, as observed via lstat (symlinks are not
/// followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Sockets, device nodes and friends. These are never mirrored.
    Other,
    /// Nothing exists at the path.
    Missing,
}

/// One filesystem node discovered during tree enumeration.
#[derive(Debug, Clone)]
pub struct Entry {
    rel: PathBuf,
    abs: PathBuf,
    kind: EntryKind,
    mode: Option<u32>,
}

impl Entry {
    pub fn new(rel: PathBuf, abs: PathBuf, kind: EntryKind, mode: Option<u32>) -> Self {
        Self {
            rel,
            abs,
            kind,
            mode,
        }
    }

    /// Path relative to the tree root this entry was discovered under.
    pub fn rel(&self) -> &Path {
        &self.rel
    }

    /// Absolute location of the entry at snapshot time.
    pub fn abs(&self) -> &Path {
        &self.abs
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Permission bits of the node, when the platform exposes them.
    pub fn mode(&self) -> Option<u32> {
        self.mode
    }
}

fn kind_of(metadata: &Metadata) -> EntryKind {
    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;

    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_of(_metadata: &Metadata) -> Option<u32> {
    None
}

/// Re-stats a path and reports what currently occupies it.
///
/// Used wherever a snapshot would be stale: destination state inside the
/// convergence engine and the source-side check before orphan deletion.
pub fn probe_kind(path: &Path) -> EntryKind {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) => kind_of(&metadata),
        Err(_) => EntryKind::Missing,
    }
}

/// Enumerates every node under `root`, parents before children, the root
/// itself excluded.
///
/// A root that is absent or not a directory yields an empty tree; syncing
/// from such a root simply empties the destination.
pub fn walk(root: &Path) -> Result<Vec<Entry>, WalkError> {
    let mut entries = Vec::new();

    if probe_kind(root) != EntryKind::Directory {
        debug!(
            "Nothing to enumerate under {}",
            root.best_effort_path_display()
        );
        return Ok(entries);
    }

    for dir_entry in walkdir::WalkDir::new(root).min_depth(1) {
        let dir_entry = dir_entry.context(EnumerateSnafu {
            root: root.to_path_buf(),
        })?;
        let metadata = dir_entry.metadata().context(EnumerateSnafu {
            root: root.to_path_buf(),
        })?;
        let rel = dir_entry
            .path()
            .strip_prefix(root)
            .expect("walked path is always under its root")
            .to_path_buf();

        entries.push(Entry::new(
            rel,
            dir_entry.path().to_path_buf(),
            kind_of(&metadata),
            mode_of(&metadata),
        ));
    }

    debug!(
        "Enumerated {} entries under {}",
        entries.len(),
        root.best_effort_path_display()
    );
    Ok(entries)
}

#[derive(Debug, Snafu)]
pub enum WalkError {
    #[snafu(display("Failed to enumerate the tree under {}", root.best_effort_path_display()))]
    EnumerateError {
        root: PathBuf,
        source: walkdir::Error,
    },
}
