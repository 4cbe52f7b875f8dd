//! A single replay slot

use crate::input::InputSample;
use crate::snapshot::Snapshot;

/// What a slot is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotMode {
    #[default]
    Idle,
    Recording,
    Playing,
}

/// Snapshot plus the input samples recorded after it
#[derive(Debug, Clone, Default)]
pub struct ReplaySlot {
    pub(super) snapshot: Option<Snapshot>,
    pub(super) samples: Vec<InputSample>,
    pub(super) mode: SlotMode,
    /// Index of the next sample to play; may equal `samples.len()`
    pub(super) cursor: usize,
}

impl ReplaySlot {
    /// Completed slot, as read back from disk
    pub fn from_recording(snapshot: Snapshot, samples: Vec<InputSample>) -> Self {
        Self {
            snapshot: Some(snapshot),
            samples,
            mode: SlotMode::Idle,
            cursor: 0,
        }
    }

    pub fn mode(&self) -> SlotMode {
        self.mode
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn samples(&self) -> &[InputSample] {
        &self.samples
    }

    /// Position of the playback cursor
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the slot holds a finished, non-empty recording
    pub fn has_recording(&self) -> bool {
        self.mode != SlotMode::Recording && self.snapshot.is_some() && !self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_slot_is_empty() {
        let slot = ReplaySlot::default();
        assert_eq!(slot.mode(), SlotMode::Idle);
        assert!(!slot.has_recording());
    }

    #[test]
    fn test_recording_needs_samples() {
        let snapshot = Snapshot::from_data(vec![0; 8]);
        assert!(!ReplaySlot::from_recording(snapshot.clone(), Vec::new()).has_recording());
        assert!(ReplaySlot::from_recording(snapshot, vec![InputSample::default()]).has_recording());
    }
}
