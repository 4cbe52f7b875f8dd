//! Simulation memory arena
//!
//! One contiguous block allocated once at startup. The simulation keeps all of
//! its state here, which is what makes byte-for-byte snapshots valid: the base
//! address and length never change, only the contents do.

use crate::config::ArenaConfig;

/// Fixed-size simulation memory
///
/// Split into a permanent region (long-lived game state) followed by a
/// transient region (scratch the simulation may rebuild at will). Both regions
/// are covered by snapshots.
pub struct Arena {
    bytes: Box<[u8]>,
    permanent_len: usize,
}

impl Arena {
    /// Allocate a zeroed arena
    pub fn new(permanent_len: usize, transient_len: usize) -> Self {
        let total = permanent_len + transient_len;
        tracing::debug!(
            "Allocating arena: {} bytes permanent + {} bytes transient",
            permanent_len,
            transient_len
        );
        Self {
            bytes: vec![0u8; total].into_boxed_slice(),
            permanent_len,
        }
    }

    /// Allocate an arena sized from configuration
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self::new(config.permanent_bytes, config.transient_bytes)
    }

    /// Total size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the arena has zero length
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Size of the permanent region in bytes
    pub fn permanent_len(&self) -> usize {
        self.permanent_len
    }

    /// Base address (stable for the lifetime of the arena)
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Whole arena as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whole arena as mutable bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Permanent region
    pub fn permanent(&self) -> &[u8] {
        &self.bytes[..self.permanent_len]
    }

    /// Mutable permanent region
    pub fn permanent_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.permanent_len]
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.bytes.len())
            .field("permanent_len", &self.permanent_len)
            .finish()
    }
}
