//! Per-frame input record
//!
//! `InputSample` is what the simulation sees and what replay slots store. It is
//! POD so a recorded stream is just a byte slice of samples.

use bytemuck::{Pod, Zeroable};

/// Button bit positions in [`InputSample::buttons`]
pub mod button {
    pub const UP: u16 = 1 << 0;
    pub const DOWN: u16 = 1 << 1;
    pub const LEFT: u16 = 1 << 2;
    pub const RIGHT: u16 = 1 << 3;
    pub const A: u16 = 1 << 4;
    pub const B: u16 = 1 << 5;
    pub const X: u16 = 1 << 6;
    pub const Y: u16 = 1 << 7;
    pub const LEFT_BUMPER: u16 = 1 << 8;
    pub const RIGHT_BUMPER: u16 = 1 << 9;
    pub const LEFT_STICK: u16 = 1 << 10;
    pub const RIGHT_STICK: u16 = 1 << 11;
    pub const START: u16 = 1 << 12;
    pub const SELECT: u16 = 1 << 13;
}

/// Mouse button bit positions in [`InputSample::mouse_buttons`]
pub mod mouse_button {
    pub const LEFT: u8 = 1 << 0;
    pub const RIGHT: u8 = 1 << 1;
    pub const MIDDLE: u8 = 1 << 2;
}

/// Input for one frame (16 bytes)
///
/// Sticks are -127..=127 with up and right positive. Triggers are 0..=255.
/// Mouse coordinates are in back buffer pixels and may be negative when the
/// cursor is outside the window.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct InputSample {
    pub buttons: u16,
    pub left_stick_x: i8,
    pub left_stick_y: i8,
    pub right_stick_x: i8,
    pub right_stick_y: i8,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub mouse_x: i16,
    pub mouse_y: i16,
    pub mouse_buttons: u8,
    pub _reserved: [u8; 3],
}

/// Size of one serialized sample
pub const INPUT_SAMPLE_SIZE: usize = std::mem::size_of::<InputSample>();

impl InputSample {
    /// Check if a button is held
    #[inline]
    pub fn is_pressed(&self, button: u16) -> bool {
        self.buttons & button != 0
    }

    /// Set or clear a button bit
    #[inline]
    pub fn set_button(&mut self, button: u16, pressed: bool) {
        if pressed {
            self.buttons |= button;
        } else {
            self.buttons &= !button;
        }
    }

    /// Merge another sample into this one (buttons OR'd, larger stick deflection wins)
    pub fn merge(&mut self, other: &InputSample) {
        fn wider(a: i8, b: i8) -> i8 {
            if b.unsigned_abs() > a.unsigned_abs() { b } else { a }
        }
        self.buttons |= other.buttons;
        self.left_stick_x = wider(self.left_stick_x, other.left_stick_x);
        self.left_stick_y = wider(self.left_stick_y, other.left_stick_y);
        self.right_stick_x = wider(self.right_stick_x, other.right_stick_x);
        self.right_stick_y = wider(self.right_stick_y, other.right_stick_y);
        self.left_trigger = self.left_trigger.max(other.left_trigger);
        self.right_trigger = self.right_trigger.max(other.right_trigger);
    }
}

/// Quantize a -1.0..=1.0 axis value
#[inline]
pub fn quantize_axis(value: f32) -> i8 {
    (value.clamp(-1.0, 1.0) * 127.0).round() as i8
}

/// Quantize a 0.0..=1.0 trigger value
#[inline]
pub fn quantize_trigger(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
