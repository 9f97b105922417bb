//! Directory creation that destroys whatever stands in the way.
//!
//! Plain `create_dir_all` is tried first and usually succeeds. When it fails
//! a non-directory occupies the target or one of its ancestors, so the
//! parent is fixed up recursively, the occupant removed, and creation
//! retried. Each recursive step moves one component closer to an ancestor
//! that is already a valid directory, so the recursion is bounded by the
//! path depth.

use std::io;
use std::path::{Path, PathBuf};

use compio::fs;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::ext::BestEffortPathExt;

/// Recursively deletes whatever occupies `path`, whatever its kind.
///
/// A path that is already gone is success, so concurrent removals race
/// harmlessly.
pub(crate) fn remove_any(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Guarantees a directory exists at `path`, clobbering any non-directory
/// found along the way. No-op when the directory is already there.
pub async fn ensure_dir(path: &Path) -> Result<(), EnsureDirError> {
    if fs::create_dir_all(path).await.is_ok() {
        return Ok(());
    }

    debug!(
        "Clearing obstruction to create directory {}",
        path.best_effort_path_display()
    );
    if let Some(parent) = path.parent() {
        Box::pin(ensure_dir(parent)).await?;
    }
    remove_any(path).context(ClearSnafu {
        path: path.to_path_buf(),
    })?;
    fs::create_dir_all(path).await.context(CreateSnafu {
        path: path.to_path_buf(),
    })
}

/// Blocking twin of [`ensure_dir`].
pub fn ensure_dir_blocking(path: &Path) -> Result<(), EnsureDirError> {
    if std::fs::create_dir_all(path).is_ok() {
        return Ok(());
    }

    debug!(
        "Clearing obstruction to create directory {}",
        path.best_effort_path_display()
    );
    if let Some(parent) = path.parent() {
        ensure_dir_blocking(parent)?;
    }
    remove_any(path).context(ClearSnafu {
        path: path.to_path_buf(),
    })?;
    std::fs::create_dir_all(path).context(CreateSnafu {
        path: path.to_path_buf(),
    })
}

#[derive(Debug, Snafu)]
pub enum EnsureDirError {
    #[snafu(display("Failed to clear the way for directory {}", path.best_effort_path_display()))]
    ClearError { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to create directory {}", path.best_effort_path_display()))]
    CreateError { path: PathBuf, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy)]
    enum Mode {
        Concurrent,
        Blocking,
    }

    async fn run_ensure_dir(mode: Mode, path: &Path) -> Result<(), EnsureDirError> {
        match mode {
            Mode::Concurrent => ensure_dir(path).await,
            Mode::Blocking => ensure_dir_blocking(path),
        }
    }

    #[rstest]
    #[case(Mode::Concurrent)]
    #[case(Mode::Blocking)]
    #[compio::test]
    async fn test_creates_nested_directories(#[case] mode: Mode) {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let target = tmp.path().join("a/b/c/d");

        run_ensure_dir(mode, &target).await.expect("ensure_dir failed");

        assert!(target.is_dir());
    }

    #[rstest]
    #[case(Mode::Concurrent)]
    #[case(Mode::Blocking)]
    #[compio::test]
    async fn test_existing_directory_is_left_alone(#[case] mode: Mode) {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let target = tmp.path().join("keep");
        stdfs::create_dir(&target).expect("Failed to create dir");
        stdfs::write(target.join("inner"), "i").expect("Failed to write file");

        run_ensure_dir(mode, &target).await.expect("ensure_dir failed");

        assert!(target.join("inner").is_file());
    }

    #[rstest]
    #[case(Mode::Concurrent)]
    #[case(Mode::Blocking)]
    #[compio::test]
    async fn test_clobbers_file_at_target(#[case] mode: Mode) {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let target = tmp.path().join("slot");
        stdfs::write(&target, "in the way").expect("Failed to write file");

        run_ensure_dir(mode, &target).await.expect("ensure_dir failed");

        assert!(target.is_dir());
    }

    #[rstest]
    #[case(Mode::Concurrent)]
    #[case(Mode::Blocking)]
    #[compio::test]
    async fn test_clobbers_file_at_intermediate_component(#[case] mode: Mode) {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        stdfs::write(tmp.path().join("a"), "in the way").expect("Failed to write file");
        let target = tmp.path().join("a/b/c");

        run_ensure_dir(mode, &target).await.expect("ensure_dir failed");

        assert!(target.is_dir());
    }

    // Bounds the recursion on a chain of obstructions rather than a single
    // one: the file sits several components above the requested directory.
    #[rstest]
    #[case(Mode::Concurrent)]
    #[case(Mode::Blocking)]
    #[compio::test]
    async fn test_clobbers_deep_obstruction_chain(#[case] mode: Mode) {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        stdfs::create_dir_all(tmp.path().join("a/b")).expect("Failed to create dirs");
        stdfs::write(tmp.path().join("a/b/c"), "obstruction").expect("Failed to write file");
        let target = tmp.path().join("a/b/c/d/e/f/g/h");

        run_ensure_dir(mode, &target).await.expect("ensure_dir failed");

        assert!(target.is_dir());
    }

    #[test]
    fn test_remove_any_tolerates_missing_path() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        remove_any(&tmp.path().join("gone")).expect("remove_any failed");
    }

    #[test]
    fn test_remove_any_removes_populated_directory() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let target = tmp.path().join("full");
        stdfs::create_dir_all(target.join("x/y")).expect("Failed to create dirs");
        stdfs::write(target.join("x/y/z"), "z").expect("Failed to write file");

        remove_any(&target).expect("remove_any failed");

        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_any_removes_symlink_not_its_target() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let real = tmp.path().join("real");
        let alias = tmp.path().join("alias");
        stdfs::write(&real, "r").expect("Failed to write file");
        std::os::unix::fs::symlink(&real, &alias).expect("Failed to create symlink");

        remove_any(&alias).expect("remove_any failed");

        assert!(real.is_file());
        assert_eq!(crate::tree::probe_kind(&alias), crate::tree::EntryKind::Missing);
    }
}
