//! Live / recording / playing transitions

use tracing::{info, warn};

use super::FrameDriver;
use crate::input::ControlEvent;
use crate::replay::ReplayError;

/// What the driver does with input this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    /// Raw input goes straight to the module
    #[default]
    Live,
    /// Raw input is appended to the slot and used
    Recording(u8),
    /// Raw input is ignored; the slot's samples are used
    Playing(u8),
}

impl DriverState {
    /// Slot being recorded or played
    pub fn slot(&self) -> Option<u8> {
        match *self {
            DriverState::Live => None,
            DriverState::Recording(slot) | DriverState::Playing(slot) => Some(slot),
        }
    }
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Live => write!(f, "live"),
            DriverState::Recording(slot) => write!(f, "recording slot {}", slot),
            DriverState::Playing(slot) => write!(f, "playing slot {}", slot),
        }
    }
}

impl FrameDriver {
    pub(super) fn apply_control(&mut self, event: ControlEvent) {
        let next = match (event, self.state) {
            (ControlEvent::SelectSlot(slot), state) => {
                match self.select_slot(slot) {
                    Ok(()) => info!("Selected replay slot {}", slot),
                    Err(e) => warn!("{}", e),
                }
                state
            }

            (ControlEvent::ToggleRecord, DriverState::Live) => {
                let slot = self.selected_slot;
                match self.deck.start_recording(slot, &self.arena) {
                    Ok(()) => DriverState::Recording(slot),
                    Err(e) => {
                        warn!("Cannot record: {}", e);
                        DriverState::Live
                    }
                }
            }

            // Either toggle ends a recording and loops it straight away
            (
                ControlEvent::ToggleRecord | ControlEvent::TogglePlayback,
                DriverState::Recording(slot),
            ) => {
                self.finish_recording(slot);
                self.begin_playback(slot)
            }

            (ControlEvent::TogglePlayback, DriverState::Live) => {
                self.begin_playback(self.selected_slot)
            }

            (
                ControlEvent::ToggleRecord | ControlEvent::TogglePlayback,
                DriverState::Playing(slot),
            ) => {
                if let Err(e) = self.deck.stop_playback(slot) {
                    warn!("{}", e);
                }
                DriverState::Live
            }
        };

        if next != self.state {
            info!("Frame driver: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    fn finish_recording(&mut self, slot: u8) {
        if let Err(e) = self.deck.stop_recording(slot) {
            warn!("{}", e);
            return;
        }
        if let Some(dir) = &self.slot_dir
            && let Err(e) = self.deck.save(slot, dir)
        {
            match e {
                ReplayError::EmptySlot(_) => {}
                e => warn!("Failed to save replay slot {}: {}", slot, e),
            }
        }
    }

    fn begin_playback(&mut self, slot: u8) -> DriverState {
        match self.deck.start_playback(slot, &mut self.arena) {
            Ok(()) => DriverState::Playing(slot),
            Err(e) => {
                warn!("Cannot play: {}", e);
                DriverState::Live
            }
        }
    }
}
