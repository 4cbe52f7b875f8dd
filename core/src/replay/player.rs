//! Looping playback from a slot

use tracing::{debug, error, info};

use super::deck::ReplayDeck;
use super::slot::SlotMode;
use super::ReplayError;
use crate::arena::Arena;
use crate::input::InputSample;
use crate::snapshot;

impl ReplayDeck {
    /// Restore the arena from `slot` and rewind its cursor
    ///
    /// The slot must hold a completed, non-empty recording. Another slot
    /// that is playing is stopped once the restore has succeeded; on error
    /// every slot is left as it was.
    pub fn start_playback(&mut self, slot: u8, arena: &mut Arena) -> Result<(), ReplayError> {
        let source = self.slot(slot)?;
        if source.mode == SlotMode::Recording {
            return Err(ReplayError::SlotBusy(slot));
        }
        if !source.has_recording() {
            return Err(ReplayError::EmptySlot(slot));
        }
        if let Some(blob) = &source.snapshot
            && let Err(e) = snapshot::restore(blob, arena)
        {
            error!("Cannot play replay slot {}: {}", slot, e);
            return Err(e.into());
        }

        if let Some(current) = self.playing_slot()
            && current != slot
        {
            self.stop_playback(current)?;
        }

        let target = self.slot_mut(slot)?;
        target.cursor = 0;
        target.mode = SlotMode::Playing;
        info!(
            "Playing replay slot {} ({} samples)",
            slot,
            target.samples.len()
        );
        Ok(())
    }

    /// Next recorded sample, restarting the loop when the end was passed
    ///
    /// The restore happens lazily on the call after the last sample, so with
    /// K samples the K+1th call restores the arena and returns sample 0.
    pub fn next_sample(
        &mut self,
        slot: u8,
        arena: &mut Arena,
    ) -> Result<InputSample, ReplayError> {
        let target = self.slot_mut(slot)?;
        if target.mode != SlotMode::Playing {
            return Err(ReplayError::NotPlaying(slot));
        }

        if target.cursor >= target.samples.len() {
            if let Some(blob) = &target.snapshot
                && let Err(e) = snapshot::restore(blob, arena)
            {
                error!("Cannot loop replay slot {}: {}", slot, e);
                return Err(e.into());
            }
            target.cursor = 0;
            debug!("Replay slot {} looped", slot);
        }

        let sample = target
            .samples
            .get(target.cursor)
            .copied()
            .ok_or(ReplayError::EmptySlot(slot))?;
        target.cursor += 1;
        Ok(sample)
    }

    /// Leave playback; the arena keeps whatever state it reached
    pub fn stop_playback(&mut self, slot: u8) -> Result<(), ReplayError> {
        let target = self.slot_mut(slot)?;
        if target.mode != SlotMode::Playing {
            return Err(ReplayError::NotPlaying(slot));
        }
        target.mode = SlotMode::Idle;
        target.cursor = 0;
        info!("Stopped playing replay slot {}", slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplaySlot;
    use crate::snapshot::Snapshot;

    fn sample(buttons: u16) -> InputSample {
        InputSample {
            buttons,
            ..Default::default()
        }
    }

    /// Records `count` samples into `slot` while bumping arena[0] each frame
    fn record(deck: &mut ReplayDeck, arena: &mut Arena, slot: u8, count: u16) {
        deck.start_recording(slot, arena).unwrap();
        for i in 0..count {
            deck.record_sample(slot, sample(i + 1)).unwrap();
            arena.as_bytes_mut()[0] += 1;
        }
        deck.stop_recording(slot).unwrap();
    }

    #[test]
    fn test_playback_restores_and_replays_in_order() {
        let mut arena = Arena::new(8, 8);
        arena.as_bytes_mut()[0] = 5;
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut arena, 1, 3);
        assert_eq!(arena.as_bytes()[0], 8);

        deck.start_playback(1, &mut arena).unwrap();
        assert_eq!(arena.as_bytes()[0], 5);
        assert_eq!(deck.playing_slot(), Some(1));

        for expected in 1..=3 {
            assert_eq!(deck.next_sample(1, &mut arena).unwrap(), sample(expected));
        }
    }

    #[test]
    fn test_loop_restores_on_call_after_last_sample() {
        let mut arena = Arena::new(4, 4);
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut arena, 2, 4);
        let blob = deck.slot(2).unwrap().snapshot().unwrap().data().to_vec();

        deck.start_playback(2, &mut arena).unwrap();
        for _ in 0..4 {
            deck.next_sample(2, &mut arena).unwrap();
            // Simulation keeps running on the replayed input
            arena.as_bytes_mut()[0] = arena.as_bytes()[0].wrapping_add(9);
        }
        assert_ne!(arena.as_bytes(), &blob[..]);

        let first = deck.next_sample(2, &mut arena).unwrap();
        assert_eq!(first, sample(1));
        assert_eq!(arena.as_bytes(), &blob[..]);
        assert_eq!(deck.slot(2).unwrap().cursor(), 1);
    }

    #[test]
    fn test_playback_is_infinite() {
        let mut arena = Arena::new(4, 0);
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut arena, 1, 2);
        deck.start_playback(1, &mut arena).unwrap();

        let played: Vec<u16> = (0..7)
            .map(|_| deck.next_sample(1, &mut arena).unwrap().buttons)
            .collect();
        assert_eq!(played, vec![1, 2, 1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_playback_requires_completed_recording() {
        let mut arena = Arena::new(4, 0);
        let mut deck = ReplayDeck::new();
        assert!(matches!(
            deck.start_playback(1, &mut arena),
            Err(ReplayError::EmptySlot(1))
        ));

        // Recorded nothing
        deck.start_recording(1, &arena).unwrap();
        assert!(matches!(
            deck.start_playback(1, &mut arena),
            Err(ReplayError::SlotBusy(1))
        ));
        deck.stop_recording(1).unwrap();
        assert!(matches!(
            deck.start_playback(1, &mut arena),
            Err(ReplayError::EmptySlot(1))
        ));
        assert_eq!(deck.playing_slot(), None);
    }

    #[test]
    fn test_stop_playback_leaves_arena() {
        let mut arena = Arena::new(4, 0);
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut arena, 1, 2);
        deck.start_playback(1, &mut arena).unwrap();
        deck.next_sample(1, &mut arena).unwrap();
        arena.as_bytes_mut()[1] = 77;

        deck.stop_playback(1).unwrap();
        assert_eq!(arena.as_bytes()[1], 77);
        assert_eq!(deck.playing_slot(), None);
        assert!(matches!(
            deck.next_sample(1, &mut arena),
            Err(ReplayError::NotPlaying(1))
        ));
    }

    #[test]
    fn test_only_one_slot_plays() {
        let mut arena = Arena::new(4, 0);
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut arena, 1, 1);
        record(&mut deck, &mut arena, 3, 1);

        deck.start_playback(1, &mut arena).unwrap();
        deck.start_playback(3, &mut arena).unwrap();
        assert_eq!(deck.playing_slot(), Some(3));
        assert_eq!(deck.slot(1).unwrap().mode(), SlotMode::Idle);
    }

    #[test]
    fn test_snapshot_size_mismatch_aborts_playback() {
        let mut small = Arena::new(4, 0);
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut small, 1, 1);

        let mut large = Arena::new(8, 0);
        large.as_bytes_mut().fill(3);
        assert!(matches!(
            deck.start_playback(1, &mut large),
            Err(ReplayError::Snapshot(_))
        ));
        assert_eq!(large.as_bytes(), &[3; 8]);
        assert_eq!(deck.playing_slot(), None);
    }

    #[test]
    fn test_failed_switch_keeps_current_slot_playing() {
        let mut arena = Arena::new(4, 0);
        let mut deck = ReplayDeck::new();
        record(&mut deck, &mut arena, 1, 2);
        let foreign = ReplaySlot::from_recording(Snapshot::from_data(vec![0; 8]), vec![sample(9)]);
        deck.insert(2, foreign).unwrap();

        deck.start_playback(1, &mut arena).unwrap();
        deck.next_sample(1, &mut arena).unwrap();
        assert!(matches!(
            deck.start_playback(2, &mut arena),
            Err(ReplayError::Snapshot(_))
        ));
        assert_eq!(deck.playing_slot(), Some(1));
        assert_eq!(deck.slot(1).unwrap().cursor(), 1);
        assert_eq!(deck.slot(2).unwrap().mode(), SlotMode::Idle);
    }
}
