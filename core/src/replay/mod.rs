//! Input replay slots
//!
//! A slot pairs one arena snapshot with the input samples recorded after it.
//! Recording captures the arena and then appends one sample per frame;
//! playback restores the arena and feeds the samples back, looping forever.
//!
//! ```text
//! record:   capture(arena) ─► slot.snapshot
//!           raw input ─► slot.samples[0..K]
//!
//! playback: restore(slot.snapshot) ─► arena
//!           slot.samples[0], [1], ... [K-1], restore, [0], ...
//! ```
//!
//! Slots are numbered from 1 to [`SLOT_COUNT`]. Completed slots can be
//! persisted as `.hlrp` files (see [`file`]).

mod deck;
pub mod file;
mod player;
mod recorder;
mod slot;

pub use deck::ReplayDeck;
pub use slot::{ReplaySlot, SlotMode};

use crate::snapshot::SnapshotError;

/// Number of replay slots
pub const SLOT_COUNT: usize = 4;

/// Error from a slot operation
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("replay slot {0} is out of range (1-{max})", max = SLOT_COUNT)]
    SlotOutOfRange(u8),
    /// Slot is in a mode that forbids the operation
    #[error("replay slot {0} is busy")]
    SlotBusy(u8),
    /// Slot has no completed recording
    #[error("replay slot {0} holds no recording")]
    EmptySlot(u8),
    #[error("replay slot {0} is not recording")]
    NotRecording(u8),
    #[error("replay slot {0} is not playing")]
    NotPlaying(u8),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("replay slot file I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert a 1-based slot number into an index
pub(crate) fn slot_index(slot: u8) -> Result<usize, ReplayError> {
    match slot as usize {
        n @ 1..=SLOT_COUNT => Ok(n - 1),
        _ => Err(ReplayError::SlotOutOfRange(slot)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_bounds() {
        assert!(matches!(slot_index(0), Err(ReplayError::SlotOutOfRange(0))));
        assert_eq!(slot_index(1).unwrap(), 0);
        assert_eq!(slot_index(SLOT_COUNT as u8).unwrap(), SLOT_COUNT - 1);
        assert!(matches!(
            slot_index(SLOT_COUNT as u8 + 1),
            Err(ReplayError::SlotOutOfRange(5))
        ));
    }
}
