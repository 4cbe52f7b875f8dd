//! Harness control keys (record, playback, slot select)

use winit::keyboard::KeyCode;

use super::keycode::string_to_keycode;
use crate::config::{ConfigError, ReplayConfig};
use crate::replay::SLOT_COUNT;

/// Harness-level command produced by a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    /// Start or stop recording into the selected slot
    ToggleRecord,
    /// Start or stop looping playback of the selected slot
    TogglePlayback,
    /// Choose the slot used by the next toggle (1-based)
    SelectSlot(u8),
}

/// Key bindings for [`ControlEvent`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlKeys {
    pub record: KeyCode,
    pub playback: KeyCode,
    pub slots: [KeyCode; SLOT_COUNT],
}

impl Default for ControlKeys {
    fn default() -> Self {
        Self {
            record: KeyCode::KeyL,
            playback: KeyCode::KeyP,
            slots: [
                KeyCode::Digit1,
                KeyCode::Digit2,
                KeyCode::Digit3,
                KeyCode::Digit4,
            ],
        }
    }
}

impl ControlKeys {
    /// Resolve the configured key names
    pub fn from_config(config: &ReplayConfig) -> Result<Self, ConfigError> {
        let resolve = |name: &str| {
            string_to_keycode(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
        };
        Ok(Self {
            record: resolve(&config.record_toggle)?,
            playback: resolve(&config.playback_toggle)?,
            ..Self::default()
        })
    }

    /// Map a key press to a control event
    pub fn match_key(&self, key: KeyCode) -> Option<ControlEvent> {
        if key == self.record {
            return Some(ControlEvent::ToggleRecord);
        }
        if key == self.playback {
            return Some(ControlEvent::TogglePlayback);
        }
        self.slots
            .iter()
            .position(|&slot_key| slot_key == key)
            .map(|index| ControlEvent::SelectSlot(index as u8 + 1))
    }
}
