//! # Formats
//!
//! Binary snapshot encoding for the in-process store.

pub mod snapshot;

pub use snapshot::{
    MAX_SNAPSHOT_SIZE, SnapshotHeader, load_snapshot, save_snapshot, snapshot_from_bytes,
    snapshot_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use snapshot::snapshot_checksum;
