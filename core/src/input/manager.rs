//! Live input polling (keyboard, mouse, gamepad)

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, Gilrs};
use hashbrown::HashMap;
use winit::keyboard::KeyCode;

use super::control::{ControlEvent, ControlKeys};
use super::sample::{InputSample, mouse_button};
use super::InputConfig;
#[cfg(feature = "gamepad")]
use super::sample::{button, quantize_axis, quantize_trigger};

/// Collects window and gamepad events into one [`InputSample`] per frame
///
/// Control keys are split out as [`ControlEvent`]s on the press edge and are
/// queued until [`InputManager::drain_controls`].
pub struct InputManager {
    /// Gilrs context (None if initialization failed or gamepad feature disabled)
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,
    /// Gamepad whose state is merged into the sample
    #[cfg(feature = "gamepad")]
    active_gamepad: Option<gilrs::GamepadId>,

    keyboard_state: HashMap<KeyCode, bool>,
    mouse_position: (i16, i16),
    mouse_buttons: u8,

    config: InputConfig,
    control_keys: ControlKeys,
    pending_controls: Vec<ControlEvent>,
}

impl InputManager {
    /// Create a new input manager
    pub fn new(config: InputConfig, control_keys: ControlKeys) -> Self {
        #[cfg(feature = "gamepad")]
        let gilrs = match Gilrs::new() {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize gamepad support: {}. Gamepads will not be available.",
                    e
                );
                None
            }
        };

        Self {
            #[cfg(feature = "gamepad")]
            gilrs,
            #[cfg(feature = "gamepad")]
            active_gamepad: None,
            keyboard_state: HashMap::new(),
            mouse_position: (0, 0),
            mouse_buttons: 0,
            config,
            control_keys,
            pending_controls: Vec::new(),
        }
    }

    /// Record a key transition
    pub fn update_keyboard(&mut self, key: KeyCode, pressed: bool) {
        let was_pressed = self.keyboard_state.insert(key, pressed).unwrap_or(false);
        if pressed
            && !was_pressed
            && let Some(event) = self.control_keys.match_key(key)
        {
            self.pending_controls.push(event);
        }
    }

    /// Record the cursor position in back buffer pixels
    pub fn update_mouse_position(&mut self, x: f64, y: f64) {
        let clamp = |v: f64| v.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        self.mouse_position = (clamp(x), clamp(y));
    }

    /// Record a mouse button transition (0 = left, 1 = right, 2 = middle)
    pub fn update_mouse_button(&mut self, index: u8, pressed: bool) {
        let bit = match index {
            0 => mouse_button::LEFT,
            1 => mouse_button::RIGHT,
            2 => mouse_button::MIDDLE,
            _ => return,
        };
        if pressed {
            self.mouse_buttons |= bit;
        } else {
            self.mouse_buttons &= !bit;
        }
    }

    /// Release everything (window lost focus)
    pub fn clear(&mut self) {
        self.keyboard_state.clear();
        self.mouse_buttons = 0;
    }

    /// Take the control events queued since the last call
    pub fn drain_controls(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.pending_controls)
    }

    /// Poll devices and produce this frame's sample
    pub fn sample(&mut self) -> InputSample {
        let keyboard_state = &self.keyboard_state;
        let mut sample = self
            .config
            .keyboard
            .sample(|key| keyboard_state.get(&key).copied().unwrap_or(false));

        #[cfg(feature = "gamepad")]
        if let Some(pad) = self.poll_gamepad() {
            sample.merge(&pad);
        }

        sample.mouse_x = self.mouse_position.0;
        sample.mouse_y = self.mouse_position.1;
        sample.mouse_buttons = self.mouse_buttons;
        sample
    }

    #[cfg(feature = "gamepad")]
    fn poll_gamepad(&mut self) -> Option<InputSample> {
        let gilrs = self.gilrs.as_mut()?;
        while let Some(event) = gilrs.next_event() {
            match event.event {
                gilrs::EventType::Connected => {
                    if self.active_gamepad.is_none() {
                        tracing::info!("Gamepad {} connected", event.id);
                        self.active_gamepad = Some(event.id);
                    }
                }
                gilrs::EventType::Disconnected => {
                    if self.active_gamepad == Some(event.id) {
                        tracing::info!("Gamepad {} disconnected", event.id);
                        self.active_gamepad = None;
                    }
                }
                _ => {}
            }
        }

        let gamepad = gilrs.gamepad(self.active_gamepad?);
        Some(read_gamepad(&gamepad, &self.config))
    }
}

#[cfg(feature = "gamepad")]
fn read_gamepad(gamepad: &gilrs::Gamepad, config: &InputConfig) -> InputSample {
    let axis = |axis: Axis| {
        quantize_axis(apply_stick_deadzone(gamepad.value(axis), config.stick_deadzone))
    };
    // Some drivers report triggers as -1..1
    let trigger = |axis: Axis| {
        let normalized = (gamepad.value(axis) + 1.0) / 2.0;
        quantize_trigger(apply_trigger_deadzone(normalized, config.trigger_deadzone))
    };

    let mut sample = InputSample {
        left_stick_x: axis(Axis::LeftStickX),
        left_stick_y: axis(Axis::LeftStickY),
        right_stick_x: axis(Axis::RightStickX),
        right_stick_y: axis(Axis::RightStickY),
        left_trigger: trigger(Axis::LeftZ),
        right_trigger: trigger(Axis::RightZ),
        ..Default::default()
    };

    for (pad_button, bit) in [
        (Button::DPadUp, button::UP),
        (Button::DPadDown, button::DOWN),
        (Button::DPadLeft, button::LEFT),
        (Button::DPadRight, button::RIGHT),
        (Button::South, button::A),
        (Button::East, button::B),
        (Button::West, button::X),
        (Button::North, button::Y),
        (Button::LeftTrigger, button::LEFT_BUMPER),
        (Button::RightTrigger, button::RIGHT_BUMPER),
        (Button::LeftThumb, button::LEFT_STICK),
        (Button::RightThumb, button::RIGHT_STICK),
        (Button::Start, button::START),
        (Button::Select, button::SELECT),
    ] {
        sample.set_button(bit, gamepad.is_pressed(pad_button));
    }
    sample
}

/// Apply deadzone to analog stick input, rescaling the remainder to full range
#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
fn apply_stick_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let magnitude = (value.abs() - deadzone) / (1.0 - deadzone);
        value.signum() * magnitude.clamp(0.0, 1.0)
    }
}

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
fn apply_trigger_deadzone(value: f32, deadzone: f32) -> f32 {
    if value < deadzone {
        0.0
    } else {
        ((value - deadzone) / (1.0 - deadzone)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::button;

    fn manager() -> InputManager {
        InputManager::new(InputConfig::default(), ControlKeys::default())
    }

    #[test]
    fn test_keyboard_sample() {
        let mut input = manager();
        input.update_keyboard(KeyCode::KeyZ, true);
        input.update_keyboard(KeyCode::ArrowUp, true);
        input.update_keyboard(KeyCode::ArrowUp, false);

        let sample = input.sample();
        assert!(sample.is_pressed(button::A));
        assert!(!sample.is_pressed(button::UP));
    }

    #[test]
    fn test_control_keys_fire_on_press_edge_only() {
        let mut input = manager();
        input.update_keyboard(KeyCode::KeyL, true);
        // Key repeat
        input.update_keyboard(KeyCode::KeyL, true);
        input.update_keyboard(KeyCode::KeyL, false);
        input.update_keyboard(KeyCode::Digit2, true);

        assert_eq!(
            input.drain_controls(),
            vec![ControlEvent::ToggleRecord, ControlEvent::SelectSlot(2)]
        );
        assert!(input.drain_controls().is_empty());
    }

    #[test]
    fn test_mouse_state_in_sample() {
        let mut input = manager();
        input.update_mouse_position(12.7, -40_000.0);
        input.update_mouse_button(1, true);
        input.update_mouse_button(7, true);

        let sample = input.sample();
        assert_eq!(sample.mouse_x, 12);
        assert_eq!(sample.mouse_y, i16::MIN);
        assert_eq!(sample.mouse_buttons, mouse_button::RIGHT);

        input.clear();
        assert_eq!(input.sample().mouse_buttons, 0);
    }

    #[test]
    fn test_deadzones() {
        assert_eq!(apply_stick_deadzone(0.1, 0.15), 0.0);
        assert_eq!(apply_stick_deadzone(1.0, 0.15), 1.0);
        assert!(apply_stick_deadzone(-0.5, 0.15) < 0.0);
        assert_eq!(apply_trigger_deadzone(0.05, 0.1), 0.0);
        assert_eq!(apply_trigger_deadzone(1.0, 0.1), 1.0);
    }
}
