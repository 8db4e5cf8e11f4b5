//! On-disk persistence of the replicated document: timestamped snapshot
//! files, atomic write-then-rename, newest-wins load, retention sweep.

pub mod manager;
pub mod manifest;

pub use manager::{LoadOutcome, SnapshotManager};
pub use manifest::SnapshotFile;
