//! Recording into a slot

use tracing::info;

use super::deck::ReplayDeck;
use super::slot::SlotMode;
use super::ReplayError;
use crate::arena::Arena;
use crate::input::InputSample;
use crate::snapshot;

impl ReplayDeck {
    /// Capture the arena into `slot` and start appending samples to it
    ///
    /// Rejected with [`ReplayError::SlotBusy`] while any slot is playing; no
    /// slot is changed in that case. A recording in progress on another slot
    /// is stopped first.
    pub fn start_recording(&mut self, slot: u8, arena: &Arena) -> Result<(), ReplayError> {
        self.slot(slot)?;
        if let Some(playing) = self.playing_slot() {
            return Err(ReplayError::SlotBusy(playing));
        }
        if let Some(current) = self.recording_slot()
            && current != slot
        {
            self.stop_recording(current)?;
        }

        let captured = snapshot::capture(arena);
        info!(
            "Recording replay slot {} (snapshot {} bytes, checksum {:#018x})",
            slot,
            captured.len(),
            captured.checksum()
        );

        let target = self.slot_mut(slot)?;
        target.snapshot = Some(captured);
        target.samples.clear();
        target.cursor = 0;
        target.mode = SlotMode::Recording;
        Ok(())
    }

    /// Append one frame's input to the recording slot
    pub fn record_sample(&mut self, slot: u8, sample: InputSample) -> Result<(), ReplayError> {
        let target = self.slot_mut(slot)?;
        if target.mode != SlotMode::Recording {
            return Err(ReplayError::NotRecording(slot));
        }
        target.samples.push(sample);
        Ok(())
    }

    /// Finish the recording; the slot is immutable from here on
    pub fn stop_recording(&mut self, slot: u8) -> Result<(), ReplayError> {
        let target = self.slot_mut(slot)?;
        if target.mode != SlotMode::Recording {
            return Err(ReplayError::NotRecording(slot));
        }
        target.mode = SlotMode::Idle;
        info!(
            "Stopped recording replay slot {} ({} samples)",
            slot,
            target.samples.len()
        );
        Ok(())
    }
}
