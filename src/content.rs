//! Byte-for-byte equality of two regular files.
//!
//! Equality is decided by comparing SHA-512 digests of the full contents.
//! The comparator never fails: any read trouble on either side reports
//! "contents differ". A spurious mismatch only costs one extra write, while
//! a spurious match would leave stale bytes in the mirror.

use std::path::Path;

use compio::fs;
use futures::join;
use sha2::{Digest, Sha512};
use tracing::debug;

use crate::ext::BestEffortPathExt;

fn digests_match(a: &[u8], b: &[u8]) -> bool {
    Sha512::digest(a) == Sha512::digest(b)
}

/// Reports whether both files hold identical bytes, reading them
/// concurrently.
pub async fn content_match(a: &Path, b: &Path) -> bool {
    let (bytes_a, bytes_b) = join!(fs::read(a), fs::read(b));
    match (bytes_a, bytes_b) {
        (Ok(bytes_a), Ok(bytes_b)) => digests_match(&bytes_a, &bytes_b),
        _ => {
            debug!(
                "Treating unreadable pair as differing: {} / {}",
                a.best_effort_path_display(),
                b.best_effort_path_display()
            );
            false
        }
    }
}

/// Blocking twin of [`content_match`].
pub fn content_match_blocking(a: &Path, b: &Path) -> bool {
    match (std::fs::read(a), std::fs::read(b)) {
        (Ok(bytes_a), Ok(bytes_b)) => digests_match(&bytes_a, &bytes_b),
        _ => {
            debug!(
                "Treating unreadable pair as differing: {} / {}",
                a.best_effort_path_display(),
                b.best_effort_path_display()
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[compio::test]
    async fn test_identical_contents_match() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, "same bytes").expect("Failed to write file");
        fs::write(&b, "same bytes").expect("Failed to write file");

        assert!(content_match(&a, &b).await);
        assert!(content_match_blocking(&a, &b));
    }

    #[compio::test]
    async fn test_different_contents_do_not_match() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, "asfd").expect("Failed to write file");
        fs::write(&b, "dfsa").expect("Failed to write file");

        assert!(!content_match(&a, &b).await);
        assert!(!content_match_blocking(&a, &b));
    }

    #[compio::test]
    async fn test_empty_files_match() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, "").expect("Failed to write file");
        fs::write(&b, "").expect("Failed to write file");

        assert!(content_match(&a, &b).await);
        assert!(content_match_blocking(&a, &b));
    }

    #[compio::test]
    async fn test_unreadable_side_reports_mismatch() {
        let tmp = TempDir::new().expect("Failed to create temp directory");
        let a = tmp.path().join("a");
        let missing = tmp.path().join("missing");
        fs::write(&a, "asfd").expect("Failed to write file");

        assert!(!content_match(&a, &missing).await);
        assert!(!content_match(&missing, &a).await);
        assert!(!content_match_blocking(&a, &missing));
    }
}
