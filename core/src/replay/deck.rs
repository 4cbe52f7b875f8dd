//! The set of replay slots

use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::file;
use super::slot::{ReplaySlot, SlotMode};
use super::{ReplayError, SLOT_COUNT, slot_index};

/// All replay slots
///
/// At most one slot records and at most one plays, never both at once.
/// Recording operations live in `recorder.rs`, playback in `player.rs`.
#[derive(Debug, Default)]
pub struct ReplayDeck {
    pub(super) slots: [ReplaySlot; SLOT_COUNT],
}

impl ReplayDeck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, slot: u8) -> Result<&ReplaySlot, ReplayError> {
        Ok(&self.slots[slot_index(slot)?])
    }

    pub(super) fn slot_mut(&mut self, slot: u8) -> Result<&mut ReplaySlot, ReplayError> {
        Ok(&mut self.slots[slot_index(slot)?])
    }

    /// Slot number currently recording
    pub fn recording_slot(&self) -> Option<u8> {
        self.slot_in_mode(SlotMode::Recording)
    }

    /// Slot number currently playing
    pub fn playing_slot(&self) -> Option<u8> {
        self.slot_in_mode(SlotMode::Playing)
    }

    fn slot_in_mode(&self, mode: SlotMode) -> Option<u8> {
        self.slots
            .iter()
            .position(|s| s.mode == mode)
            .map(|i| i as u8 + 1)
    }

    /// Replace an idle slot with a completed recording
    pub fn insert(&mut self, slot: u8, recording: ReplaySlot) -> Result<(), ReplayError> {
        let target = self.slot_mut(slot)?;
        if target.mode != SlotMode::Idle {
            return Err(ReplayError::SlotBusy(slot));
        }
        *target = ReplaySlot {
            mode: SlotMode::Idle,
            cursor: 0,
            ..recording
        };
        Ok(())
    }

    /// Write a completed slot to `dir`, returning the file path
    pub fn save(&self, slot: u8, dir: &Path) -> Result<PathBuf, ReplayError> {
        let source = self.slot(slot)?;
        if !source.has_recording() {
            return Err(ReplayError::EmptySlot(slot));
        }
        std::fs::create_dir_all(dir)?;
        let path = file::slot_path(dir, slot);
        file::save(&path, source)?;
        info!(
            "Saved replay slot {} to {} ({} samples)",
            slot,
            path.display(),
            source.samples.len()
        );
        Ok(path)
    }

    /// Load every slot file present in `dir`
    ///
    /// Missing files are skipped. Returns the slot numbers that were loaded.
    /// A file recorded against a different arena size is reported loudly and
    /// skipped; other slots still load.
    pub fn load_dir(&mut self, dir: &Path, arena_len: usize) -> Vec<u8> {
        let mut loaded = Vec::new();
        for slot in 1..=SLOT_COUNT as u8 {
            let path = file::slot_path(dir, slot);
            if !path.exists() {
                continue;
            }
            match file::load(&path, arena_len).and_then(|rec| self.insert(slot, rec)) {
                Ok(()) => {
                    info!("Loaded replay slot {} from {}", slot, path.display());
                    loaded.push(slot);
                }
                Err(e) => error!("Failed to load replay slot {} from {}: {}", slot, path.display(), e),
            }
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::input::InputSample;

    fn sample(buttons: u16) -> InputSample {
        InputSample {
            buttons,
            ..Default::default()
        }
    }

    fn recorded_deck(arena: &mut Arena, slot: u8, samples: &[InputSample]) -> ReplayDeck {
        let mut deck = ReplayDeck::new();
        deck.start_recording(slot, arena).unwrap();
        for s in samples {
            deck.record_sample(slot, *s).unwrap();
        }
        deck.stop_recording(slot).unwrap();
        deck
    }

    #[test]
    fn test_new_deck_is_idle() {
        let deck = ReplayDeck::new();
        assert_eq!(deck.recording_slot(), None);
        assert_eq!(deck.playing_slot(), None);
        assert!(deck.slot(0).is_err());
        assert!(!deck.slot(1).unwrap().has_recording());
    }

    #[test]
    fn test_insert_rejects_busy_slot() {
        let mut arena = Arena::new(8, 0);
        let mut deck = ReplayDeck::new();
        deck.start_recording(2, &mut arena).unwrap();

        let err = deck.insert(2, ReplaySlot::default()).unwrap_err();
        assert!(matches!(err, ReplayError::SlotBusy(2)));
        assert_eq!(deck.recording_slot(), Some(2));
    }

    #[test]
    fn test_save_and_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = Arena::new(32, 32);
        arena.as_bytes_mut()[3] = 42;
        let deck = recorded_deck(&mut arena, 3, &[sample(1), sample(2)]);

        let path = deck.save(3, dir.path()).unwrap();
        assert!(path.ends_with("slot_3.hlrp"));
        assert!(matches!(deck.save(1, dir.path()), Err(ReplayError::EmptySlot(1))));

        let mut fresh = ReplayDeck::new();
        assert_eq!(fresh.load_dir(dir.path(), arena.len()), vec![3]);
        let slot = fresh.slot(3).unwrap();
        assert!(slot.has_recording());
        assert_eq!(slot.samples(), &[sample(1), sample(2)]);
        assert_eq!(slot.snapshot().unwrap().data()[3], 42);
    }

    #[test]
    fn test_load_dir_skips_wrong_arena_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut arena = Arena::new(16, 0);
        recorded_deck(&mut arena, 1, &[sample(1)])
            .save(1, dir.path())
            .unwrap();

        let mut fresh = ReplayDeck::new();
        assert!(fresh.load_dir(dir.path(), 64).is_empty());
        assert!(!fresh.slot(1).unwrap().has_recording());
    }
}
