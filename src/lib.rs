//! Mirror one directory tree onto another with minimal writes.
//!
//! [`sync_trees`] (concurrent) and [`sync_trees_blocking`] (sequential) make
//! the destination an exact structural and content mirror of the source:
//! matching entries are left untouched, diverging entries are converged
//! toward the source, and destination-only entries are removed. Both forms
//! share one per-entry decision table and produce identical end states.

pub mod clobber;
pub mod content;
pub mod converge;
mod ext;
pub mod sync;
pub mod tree;
pub mod validate;

pub use sync::{SyncError, sync_trees, sync_trees_blocking};
