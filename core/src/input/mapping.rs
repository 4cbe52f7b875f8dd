//! Keyboard to virtual controller mapping

use serde::{Deserialize, Serialize};
use winit::keyboard::KeyCode;

use super::keycode::key_name;
use super::sample::{InputSample, button};

/// Keyboard layout for the virtual controller
///
/// Avoids the default replay keys (L, P, 1-4) so recording controls never
/// leak into gameplay input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardMapping {
    #[serde(with = "key_name")]
    pub dpad_up: KeyCode,
    #[serde(with = "key_name")]
    pub dpad_down: KeyCode,
    #[serde(with = "key_name")]
    pub dpad_left: KeyCode,
    #[serde(with = "key_name")]
    pub dpad_right: KeyCode,

    #[serde(with = "key_name")]
    pub button_a: KeyCode,
    #[serde(with = "key_name")]
    pub button_b: KeyCode,
    #[serde(with = "key_name")]
    pub button_x: KeyCode,
    #[serde(with = "key_name")]
    pub button_y: KeyCode,

    #[serde(with = "key_name")]
    pub left_bumper: KeyCode,
    #[serde(with = "key_name")]
    pub right_bumper: KeyCode,

    #[serde(with = "key_name")]
    pub start: KeyCode,
    #[serde(with = "key_name")]
    pub select: KeyCode,

    // Left stick axis keys
    #[serde(with = "key_name")]
    pub left_stick_up: KeyCode,
    #[serde(with = "key_name")]
    pub left_stick_down: KeyCode,
    #[serde(with = "key_name")]
    pub left_stick_left: KeyCode,
    #[serde(with = "key_name")]
    pub left_stick_right: KeyCode,
}

impl Default for KeyboardMapping {
    fn default() -> Self {
        Self {
            dpad_up: KeyCode::ArrowUp,
            dpad_down: KeyCode::ArrowDown,
            dpad_left: KeyCode::ArrowLeft,
            dpad_right: KeyCode::ArrowRight,
            button_a: KeyCode::KeyZ,
            button_b: KeyCode::KeyX,
            button_x: KeyCode::KeyC,
            button_y: KeyCode::KeyV,
            left_bumper: KeyCode::KeyQ,
            right_bumper: KeyCode::KeyE,
            start: KeyCode::Enter,
            select: KeyCode::ShiftRight,
            left_stick_up: KeyCode::KeyW,
            left_stick_down: KeyCode::KeyS,
            left_stick_left: KeyCode::KeyA,
            left_stick_right: KeyCode::KeyD,
        }
    }
}

impl KeyboardMapping {
    /// Build a sample from the current key state
    pub fn sample(&self, is_pressed: impl Fn(KeyCode) -> bool) -> InputSample {
        // Opposite keys cancel out
        let axis = |negative: KeyCode, positive: KeyCode| -> i8 {
            match (is_pressed(negative), is_pressed(positive)) {
                (true, false) => -127,
                (false, true) => 127,
                _ => 0,
            }
        };

        let mut sample = InputSample {
            left_stick_x: axis(self.left_stick_left, self.left_stick_right),
            left_stick_y: axis(self.left_stick_down, self.left_stick_up),
            ..Default::default()
        };

        for (key, bit) in [
            (self.dpad_up, button::UP),
            (self.dpad_down, button::DOWN),
            (self.dpad_left, button::LEFT),
            (self.dpad_right, button::RIGHT),
            (self.button_a, button::A),
            (self.button_b, button::B),
            (self.button_x, button::X),
            (self.button_y, button::Y),
            (self.left_bumper, button::LEFT_BUMPER),
            (self.right_bumper, button::RIGHT_BUMPER),
            (self.start, button::START),
            (self.select, button::SELECT),
        ] {
            sample.set_button(bit, is_pressed(key));
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_mapping_roundtrip() {
        let mapping = KeyboardMapping::default();
        let toml_str = toml::to_string(&mapping).expect("serialize");
        assert!(toml_str.contains("ArrowUp"));
        assert!(toml_str.contains("ShiftRight"));

        let parsed: KeyboardMapping = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed, mapping);
    }

    #[test]
    fn test_keyboard_mapping_partial_override() {
        let parsed: KeyboardMapping = toml::from_str("button_a = \"J\"\n").expect("deserialize");
        assert_eq!(parsed.button_a, KeyCode::KeyJ);
        assert_eq!(parsed.dpad_up, KeyCode::ArrowUp);
    }

    #[test]
    fn test_keyboard_mapping_rejects_unknown_key() {
        assert!(toml::from_str::<KeyboardMapping>("start = \"Hyper\"\n").is_err());
    }

    #[test]
    fn test_sample_from_keys() {
        let mapping = KeyboardMapping::default();
        let held = [KeyCode::KeyZ, KeyCode::ArrowLeft, KeyCode::KeyD];
        let sample = mapping.sample(|key| held.contains(&key));

        assert!(sample.is_pressed(button::A));
        assert!(sample.is_pressed(button::LEFT));
        assert!(!sample.is_pressed(button::B));
        assert_eq!(sample.left_stick_x, 127);
        assert_eq!(sample.left_stick_y, 0);
    }

    #[test]
    fn test_opposite_stick_keys_cancel() {
        let mapping = KeyboardMapping::default();
        let held = [KeyCode::KeyA, KeyCode::KeyD, KeyCode::KeyS];
        let sample = mapping.sample(|key| held.contains(&key));
        assert_eq!(sample.left_stick_x, 0);
        assert_eq!(sample.left_stick_y, -127);
    }
}
