//! Persistence layer: collection snapshots with checksums.

pub mod serialization;
pub mod snapshot;

pub use snapshot::SnapshotManager;
