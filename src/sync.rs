//! Whole-tree synchronization: enumerate both endpoints, converge every
//! source entry, remove destination orphans.
//!
//! Both execution modes share the same decision table ([`crate::converge`])
//! and the same validator; they differ only in whether per-entry work is
//! launched together and awaited jointly or performed one entry at a time.

use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, try_join_all};
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::clobber::{self, EnsureDirError, remove_any};
use crate::converge::{ConvergeError, converge_entry, converge_entry_blocking};
use crate::ext::BestEffortPathExt;
use crate::tree::{self, Entry, EntryKind, WalkError, probe_kind};
use crate::validate::{ValidationError, validate_roots};

/// Mirrors the tree under `from` onto `to`, issuing per-entry work
/// concurrently.
///
/// Every source entry and every destination orphan check is launched
/// together and awaited jointly; ordering between entries is unconstrained
/// because directory provisioning is idempotent and removals tolerate
/// already-gone paths. The first fatal entry error aborts the sync;
/// completed mutations on other entries are not rolled back.
pub async fn sync_trees(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
) -> Result<(), SyncError> {
    let (from_root, to_root) = validate_roots(from.as_ref(), to.as_ref()).context(RootsSnafu)?;
    let (source, dest) = enumerate(&from_root, &to_root)?;

    if probe_kind(&from_root) == EntryKind::Directory {
        clobber::ensure_dir(&to_root)
            .await
            .context(DestinationRootSnafu)?;
    }

    let mut jobs: Vec<LocalBoxFuture<'_, Result<(), SyncError>>> = Vec::new();
    for entry in &source {
        let target = to_root.join(entry.rel());
        jobs.push(
            async move {
                converge_entry(entry, &target).await.context(EntrySnafu {
                    path: entry.rel().to_path_buf(),
                })
            }
            .boxed_local(),
        );
    }
    for entry in &dest {
        let counterpart = from_root.join(entry.rel());
        jobs.push(
            async move {
                remove_orphan(&counterpart, entry);
                Ok(())
            }
            .boxed_local(),
        );
    }

    try_join_all(jobs).await?;
    Ok(())
}

/// Blocking twin of [`sync_trees`]: same validation, same per-entry decision
/// table, one entry at a time.
pub fn sync_trees_blocking(
    from: impl AsRef<Path>,
    to: impl AsRef<Path>,
) -> Result<(), SyncError> {
    let (from_root, to_root) = validate_roots(from.as_ref(), to.as_ref()).context(RootsSnafu)?;
    let (source, dest) = enumerate(&from_root, &to_root)?;

    if probe_kind(&from_root) == EntryKind::Directory {
        clobber::ensure_dir_blocking(&to_root).context(DestinationRootSnafu)?;
    }

    for entry in &source {
        let target = to_root.join(entry.rel());
        converge_entry_blocking(entry, &target).context(EntrySnafu {
            path: entry.rel().to_path_buf(),
        })?;
    }
    for entry in &dest {
        remove_orphan(&from_root.join(entry.rel()), entry);
    }

    Ok(())
}

fn enumerate(from_root: &Path, to_root: &Path) -> Result<(Vec<Entry>, Vec<Entry>), SyncError> {
    let source = tree::walk(from_root).context(SourceWalkSnafu)?;
    let dest = tree::walk(to_root).context(DestinationWalkSnafu)?;
    debug!(
        "Pairing {} source entries against {} destination entries",
        source.len(),
        dest.len()
    );
    Ok((source, dest))
}

/// Deletes a destination entry whose source counterpart is absent.
///
/// The source side is re-stat'd at processing time rather than read from the
/// snapshot, and the delete is best-effort: a concurrent process may have
/// removed the entry (or its parent orphan directory) first.
fn remove_orphan(counterpart: &Path, dest_entry: &Entry) {
    if probe_kind(counterpart) != EntryKind::Missing {
        return;
    }
    debug!(
        "Removing destination orphan {}",
        dest_entry.abs().best_effort_path_display()
    );
    if let Err(e) = remove_any(dest_entry.abs()) {
        debug!(
            "Orphan {} vanished before removal: {}",
            dest_entry.abs().best_effort_path_display(),
            e
        );
    }
}

#[derive(Debug, Snafu)]
pub enum SyncError {
    #[snafu(display("Refusing to sync between these roots"))]
    RootsError { source: ValidationError },
    #[snafu(display("Failed to enumerate the source tree"))]
    SourceWalkError { source: WalkError },
    #[snafu(display("Failed to enumerate the destination tree"))]
    DestinationWalkError { source: WalkError },
    #[snafu(display("Failed to provision the destination root"))]
    DestinationRootError { source: EnsureDirError },
    #[snafu(display("Failed to converge destination entry '{}'", path.display()))]
    EntryError {
        path: PathBuf,
        source: ConvergeError,
    },
}
