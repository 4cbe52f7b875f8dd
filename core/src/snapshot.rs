//! Whole-arena snapshots
//!
//! A snapshot is a flat byte copy of the simulation arena. The store knows
//! nothing about what the bytes mean; it only guarantees that a restore
//! reproduces the captured contents exactly or fails without touching anything.

use crate::arena::Arena;

/// Error restoring or loading a snapshot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// Blob length does not match the live arena
    #[error("snapshot size mismatch: blob is {blob} bytes, arena is {arena} bytes")]
    SizeMismatch { blob: usize, arena: usize },
    /// Blob contents do not hash to the recorded checksum
    #[error("snapshot checksum mismatch: expected {expected:#018x}, found {found:#018x}")]
    ChecksumMismatch { expected: u64, found: u64 },
}

/// Captured arena contents
///
/// Immutable once captured. Carries an xxHash3 checksum so blobs read back
/// from disk can be verified and so logs can identify which state a replay
/// started from.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    data: Vec<u8>,
    checksum: u64,
}

impl Snapshot {
    /// Create a snapshot from raw bytes, computing the checksum
    pub fn from_data(data: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self { data, checksum }
    }

    /// Create a snapshot from bytes and a previously recorded checksum
    ///
    /// Fails if the bytes do not hash to `checksum`.
    pub fn from_parts(data: Vec<u8>, checksum: u64) -> Result<Self, SnapshotError> {
        let found = Self::compute_checksum(&data);
        if found != checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: checksum,
                found,
            });
        }
        Ok(Self { data, checksum })
    }

    /// Snapshot bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if this snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// xxHash3 checksum of the contents
    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    fn compute_checksum(data: &[u8]) -> u64 {
        xxhash_rust::xxh3::xxh3_64(data)
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.data.len())
            .field("checksum", &format_args!("{:#018x}", self.checksum))
            .finish()
    }
}

/// Copy the full arena into a new snapshot
pub fn capture(arena: &Arena) -> Snapshot {
    Snapshot::from_data(arena.as_bytes().to_vec())
}

/// Copy a snapshot back over the arena
///
/// The arena is left untouched if the sizes differ.
pub fn restore(snapshot: &Snapshot, arena: &mut Arena) -> Result<(), SnapshotError> {
    if snapshot.len() != arena.len() {
        return Err(SnapshotError::SizeMismatch {
            blob: snapshot.len(),
            arena: arena.len(),
        });
    }
    arena.as_bytes_mut().copy_from_slice(snapshot.data());
    Ok(())
}
