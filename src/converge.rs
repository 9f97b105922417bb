//! Per-entry convergence: mutates one destination path until it matches its
//! source counterpart.
//!
//! The destination is re-stat'd on entry rather than trusted from the
//! snapshot, so concurrent jobs observe whatever their siblings have already
//! materialized. Source entries are never mutated, with one deliberate
//! exception: applying the source's own mode to a freshly hard-linked file
//! touches the shared inode, which is a no-op by value.

use std::io;
use std::path::{Path, PathBuf};

use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::clobber::{self, EnsureDirError, remove_any};
use crate::content::{content_match, content_match_blocking};
use crate::ext::BestEffortPathExt;
use crate::tree::{Entry, EntryKind, probe_kind};

/// Converges the destination path toward the given source entry.
///
/// Only files, directories and symlinks are mirrored; a source entry of any
/// other kind clears the destination path and creates nothing.
pub async fn converge_entry(src: &Entry, dest: &Path) -> Result<(), ConvergeError> {
    match src.kind() {
        EntryKind::Symlink => {
            let target = std::fs::read_link(src.abs()).context(ReadLinkSnafu {
                path: src.abs().to_path_buf(),
            })?;
            if probe_kind(dest) != EntryKind::Missing {
                if points_to(dest, &target) {
                    debug!("Symlink already converged: {}", dest.best_effort_path_display());
                    return Ok(());
                }
                remove_occupant(dest)?;
            }
            ensure_parent(dest).await?;
            create_symlink(&target, dest).context(CreateSymlinkSnafu {
                path: dest.to_path_buf(),
            })?;
            // Most platforms cannot change the mode of a symlink itself, so
            // mode application here is skipped rather than attempted and
            // ignored.
            Ok(())
        }
        EntryKind::Directory => {
            if probe_kind(dest) != EntryKind::Directory {
                clobber::ensure_dir(dest).await.context(ProvisionDirSnafu)?;
            }
            apply_mode(dest, src.mode())
        }
        EntryKind::File => {
            let mut write = true;
            let dest_kind = probe_kind(dest);
            if dest_kind != EntryKind::Missing && dest_kind != EntryKind::File {
                remove_occupant(dest)?;
            } else if dest_kind == EntryKind::File && content_match(src.abs(), dest).await {
                debug!("Contents already converged: {}", dest.best_effort_path_display());
                write = false;
            }
            if write {
                ensure_parent(dest).await?;
                materialize(src.abs(), dest).await?;
            }
            apply_mode(dest, src.mode())
        }
        EntryKind::Other | EntryKind::Missing => {
            if probe_kind(dest) != EntryKind::Missing {
                remove_occupant(dest)?;
            }
            Ok(())
        }
    }
}

/// Blocking twin of [`converge_entry`], same decision table with blocking
/// I/O.
pub fn converge_entry_blocking(src: &Entry, dest: &Path) -> Result<(), ConvergeError> {
    match src.kind() {
        EntryKind::Symlink => {
            let target = std::fs::read_link(src.abs()).context(ReadLinkSnafu {
                path: src.abs().to_path_buf(),
            })?;
            if probe_kind(dest) != EntryKind::Missing {
                if points_to(dest, &target) {
                    debug!("Symlink already converged: {}", dest.best_effort_path_display());
                    return Ok(());
                }
                remove_occupant(dest)?;
            }
            ensure_parent_blocking(dest)?;
            create_symlink(&target, dest).context(CreateSymlinkSnafu {
                path: dest.to_path_buf(),
            })?;
            Ok(())
        }
        EntryKind::Directory => {
            if probe_kind(dest) != EntryKind::Directory {
                clobber::ensure_dir_blocking(dest).context(ProvisionDirSnafu)?;
            }
            apply_mode(dest, src.mode())
        }
        EntryKind::File => {
            let mut write = true;
            let dest_kind = probe_kind(dest);
            if dest_kind != EntryKind::Missing && dest_kind != EntryKind::File {
                remove_occupant(dest)?;
            } else if dest_kind == EntryKind::File && content_match_blocking(src.abs(), dest) {
                debug!("Contents already converged: {}", dest.best_effort_path_display());
                write = false;
            }
            if write {
                ensure_parent_blocking(dest)?;
                materialize_blocking(src.abs(), dest)?;
            }
            apply_mode(dest, src.mode())
        }
        EntryKind::Other | EntryKind::Missing => {
            if probe_kind(dest) != EntryKind::Missing {
                remove_occupant(dest)?;
            }
            Ok(())
        }
    }
}

/// True when `dest` is a symlink whose target string equals `target`.
fn points_to(dest: &Path, target: &Path) -> bool {
    match std::fs::read_link(dest) {
        Ok(existing) => existing == target,
        Err(_) => false,
    }
}

fn remove_occupant(dest: &Path) -> Result<(), ConvergeError> {
    remove_any(dest).context(ReplaceSnafu {
        path: dest.to_path_buf(),
    })
}

async fn ensure_parent(dest: &Path) -> Result<(), ConvergeError> {
    if let Some(parent) = dest.parent() {
        clobber::ensure_dir(parent).await.context(ProvisionDirSnafu)?;
    }
    Ok(())
}

fn ensure_parent_blocking(dest: &Path) -> Result<(), ConvergeError> {
    if let Some(parent) = dest.parent() {
        clobber::ensure_dir_blocking(parent).context(ProvisionDirSnafu)?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(windows)]
fn create_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, dest)
}

/// Puts the source bytes at `dest`: a hard link when the platform and volume
/// allow one, a full copy otherwise. The fallback is unconditional on any
/// link failure; both routes end in byte-identical contents.
pub(crate) async fn materialize(src: &Path, dest: &Path) -> Result<(), ConvergeError> {
    if std::fs::hard_link(src, dest).is_ok() {
        return Ok(());
    }
    debug!(
        "Hard link unavailable, copying {} to {}",
        src.best_effort_path_display(),
        dest.best_effort_path_display()
    );
    copy_contents(src, dest).await
}

/// Blocking twin of [`materialize`].
pub(crate) fn materialize_blocking(src: &Path, dest: &Path) -> Result<(), ConvergeError> {
    if std::fs::hard_link(src, dest).is_ok() {
        return Ok(());
    }
    debug!(
        "Hard link unavailable, copying {} to {}",
        src.best_effort_path_display(),
        dest.best_effort_path_display()
    );
    std::fs::copy(src, dest)
        .map(|_| ())
        .context(CopySnafu {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
        })
}

pub(crate) async fn copy_contents(src: &Path, dest: &Path) -> Result<(), ConvergeError> {
    let bytes = fs::read(src).await.context(CopySnafu {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
    })?;
    std::fs::write(dest, bytes).context(CopySnafu {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
    })
}

#[cfg(unix)]
fn apply_mode(dest: &Path, mode: Option<u32>) -> Result<(), ConvergeError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return Ok(());
    };
    std::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode)).context(SetModeSnafu {
        path: dest.to_path_buf(),
        mode,
    })
}

#[cfg(not(unix))]
fn apply_mode(_dest: &Path, _mode: Option<u32>) -> Result<(), ConvergeError> {
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum ConvergeError {
    #[snafu(display("Failed to read symlink target of {}", path.best_effort_path_display()))]
    ReadLinkError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to remove entry occupying {}", path.best_effort_path_display()))]
    ReplaceError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to provision a destination directory"))]
    ProvisionDirError { source: EnsureDirError },
    #[snafu(display("Failed to create symlink at {}", path.best_effort_path_display()))]
    CreateSymlinkError { path: PathBuf, source: io::Error },
    #[snafu(display(
        "Failed to copy {} to {}",
        from.best_effort_path_display(),
        to.best_effort_path_display()
    ))]
    CopyError {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[snafu(display("Failed to set mode {:o} on {}", mode, path.best_effort_path_display()))]
    SetModeError {
        path: PathBuf,
        mode: u32,
        source: io::Error,
    },
}
