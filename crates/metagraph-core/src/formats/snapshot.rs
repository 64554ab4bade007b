//! # Snapshot Format
//!
//! Binary serialization of a [`MemoryStore`] snapshot.
//!
//! Format: Header (5 bytes) + postcard-serialized [`StoreSnapshot`].
//! - 4 bytes: Magic ("MGRF")
//! - 1 byte: Version
//!
//! Size and header are checked before the payload is decoded. The byte
//! functions do no I/O; [`save_snapshot`] and [`load_snapshot`] are the thin
//! file wrappers the binary uses.

use crate::memory::{MemoryStore, StoreSnapshot};
use crate::{MetadataError, MetadataResult, primitives};
use std::path::Path;

// =============================================================================
// LIMITS
// =============================================================================

/// Largest snapshot accepted by [`snapshot_from_bytes`].
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024; // 256 MB

const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> MetadataResult<()> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(MetadataError::Serialization(
                "not a metagraph snapshot".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(MetadataError::Serialization(format!(
                "unsupported snapshot version {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> MetadataResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(MetadataError::Serialization(
                "snapshot header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// BYTES
// =============================================================================

pub fn snapshot_to_bytes(snapshot: &StoreSnapshot) -> MetadataResult<Vec<u8>> {
    let payload =
        postcard::to_stdvec(snapshot).map_err(|e| MetadataError::Serialization(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&SnapshotHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn snapshot_from_bytes(bytes: &[u8]) -> MetadataResult<StoreSnapshot> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(MetadataError::Serialization(format!(
            "snapshot of {} bytes exceeds the {} byte limit",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }
    SnapshotHeader::from_bytes(bytes)?.validate()?;
    postcard::from_bytes(&bytes[HEADER_LEN..])
        .map_err(|e| MetadataError::Serialization(format!("corrupt snapshot payload: {}", e)))
}

/// BLAKE3 hex digest of an encoded snapshot.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn snapshot_checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// FILES
// =============================================================================

/// Write `store` to `path`, replacing any existing file.
pub fn save_snapshot(store: &MemoryStore, path: &Path) -> MetadataResult<()> {
    let bytes = snapshot_to_bytes(&store.snapshot())?;
    std::fs::write(path, bytes).map_err(|e| MetadataError::Io(e.to_string()))
}

/// Load a store from `path`; a missing file yields an empty store.
pub fn load_snapshot(path: &Path) -> MetadataResult<MemoryStore> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }
    let bytes = std::fs::read(path).map_err(|e| MetadataError::Io(e.to_string()))?;
    MemoryStore::from_snapshot(snapshot_from_bytes(&bytes)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MetadataStore, NewElement};
    use crate::{ElementProperties, ErrorKind};

    fn populated() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_element(
                "u",
                &NewElement::new("Glossary")
                    .with_properties(ElementProperties::new().with("qualifiedName", "G")),
            )
            .expect("create");
        store
    }

    #[test]
    fn header_roundtrip() {
        let bytes = SnapshotHeader::new().to_bytes();
        let header = SnapshotHeader::from_bytes(&bytes).expect("parse");
        assert_eq!(header, SnapshotHeader::new());
        assert!(header.validate().is_ok());
    }

    #[test]
    fn encode_is_stable() {
        let store = populated();
        let first = snapshot_to_bytes(&store.snapshot()).expect("encode");
        let reloaded =
            MemoryStore::from_snapshot(snapshot_from_bytes(&first).expect("decode")).expect("load");
        let second = snapshot_to_bytes(&reloaded.snapshot()).expect("encode");
        assert_eq!(first, second);
    }

    #[test]
    fn wrong_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&StoreSnapshot::default()).expect("encode");
        bytes[0..4].copy_from_slice(b"XXXX");
        let err = snapshot_from_bytes(&bytes).expect_err("magic");
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = snapshot_to_bytes(&populated().snapshot()).expect("encode");
        assert!(snapshot_from_bytes(&bytes[..bytes.len() / 2]).is_err());
        assert!(snapshot_from_bytes(&bytes[..3]).is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.mgrf");

        let empty = load_snapshot(&path).expect("missing file");
        assert_eq!(empty.statistics().expect("stats").elements, 0);

        save_snapshot(&populated(), &path).expect("save");
        let loaded = load_snapshot(&path).expect("load");
        assert_eq!(loaded.statistics().expect("stats").elements, 1);
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn checksum_is_hex() {
        let sum = snapshot_checksum(b"abc");
        assert_eq!(sum.len(), 64);
    }
}
