//! Pre-flight checks on the two sync roots.
//!
//! Runs before any traversal or mutation. Roots are resolved against the
//! working directory and normalized lexically only, so a symlinked root is
//! judged by the path the caller named.

use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu, ensure};

use crate::ext::{BestEffortPathExt, normalize_path};

/// Validates the pair of sync roots and returns them resolved to absolute,
/// normalized form.
///
/// Refuses a filesystem root on either side, and refuses roots where one is
/// equal to or an ancestor of the other (checked in both directions). No
/// side effects.
pub fn validate_roots(from: &Path, to: &Path) -> Result<(PathBuf, PathBuf), ValidationError> {
    let from = resolve(from)?;
    let to = resolve(to)?;

    ensure!(
        from.parent().is_some(),
        FilesystemRootSnafu { path: from.clone() }
    );
    ensure!(
        to.parent().is_some(),
        FilesystemRootSnafu { path: to.clone() }
    );
    ensure!(
        !from.starts_with(&to) && !to.starts_with(&from),
        NestedRootsSnafu {
            from: from.clone(),
            to: to.clone(),
        }
    );

    Ok((from, to))
}

fn resolve(path: &Path) -> Result<PathBuf, ValidationError> {
    let current_dir = std::env::current_dir().context(CurrentDirSnafu)?;
    Ok(normalize_path(&current_dir.join(path)))
}

#[derive(Debug, Snafu)]
pub enum ValidationError {
    #[snafu(display("Failed to obtain the current working directory"))]
    CurrentDirError { source: std::io::Error },
    #[snafu(display("Cannot sync a filesystem root: {}", path.best_effort_path_display()))]
    FilesystemRootError { path: PathBuf },
    #[snafu(display(
        "Cannot sync a tree into itself, its parent, or its child: {} / {}",
        from.best_effort_path_display(),
        to.best_effort_path_display()
    ))]
    NestedRootsError { from: PathBuf, to: PathBuf },
}
