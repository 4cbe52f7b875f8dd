//! Input sampling for keyboard, mouse and gamepad

mod control;
mod keycode;
mod manager;
mod mapping;
mod sample;

pub use control::{ControlEvent, ControlKeys};
pub use keycode::{keycode_to_string, string_to_keycode};
pub use manager::InputManager;
pub use mapping::KeyboardMapping;
pub use sample::{
    INPUT_SAMPLE_SIZE, InputSample, button, mouse_button, quantize_axis, quantize_trigger,
};

use serde::{Deserialize, Serialize};

/// Input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Keyboard layout for the virtual controller
    #[serde(default)]
    pub keyboard: KeyboardMapping,

    /// Deadzone for analog sticks (0.0-1.0)
    #[serde(default = "default_deadzone")]
    pub stick_deadzone: f32,

    /// Deadzone for analog triggers (0.0-1.0)
    #[serde(default = "default_trigger_deadzone")]
    pub trigger_deadzone: f32,
}

fn default_deadzone() -> f32 {
    0.15
}
fn default_trigger_deadzone() -> f32 {
    0.1
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keyboard: KeyboardMapping::default(),
            stick_deadzone: default_deadzone(),
            trigger_deadzone: default_trigger_deadzone(),
        }
    }
}
