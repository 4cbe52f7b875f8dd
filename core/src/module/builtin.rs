//! In-process simulations
//!
//! [`GradientSimulation`] is the demo that runs when no module file is
//! configured. All of its state lives in the arena's permanent region, so it
//! records and replays like any other module.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};

use super::{EntryPoints, ModuleHandle, ModuleLoader, Simulation, SoundBuffer};
use crate::arena::Arena;
use crate::frame_buffer::{FrameBuffer, pack_bgrx};
use crate::input::{InputSample, button, mouse_button};

/// Wraps a factory for an in-process simulation; never stale
pub struct StaticModuleLoader {
    factory: Box<dyn FnMut() -> Box<dyn Simulation>>,
}

impl StaticModuleLoader {
    pub fn new(factory: impl FnMut() -> Box<dyn Simulation> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
        }
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&mut self) -> ModuleHandle {
        ModuleHandle::new((self.factory)(), None)
    }

    fn should_reload(&self, _handle: &ModuleHandle) -> bool {
        false
    }
}

/// Demo state stored at the start of the permanent region
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct DemoState {
    initialized: u32,
    tone_hz: u32,
    x_offset: i32,
    y_offset: i32,
    player_x: i32,
    player_y: i32,
    t_sine: f32,
    _pad: u32,
}

const DEMO_STATE_SIZE: usize = std::mem::size_of::<DemoState>();
const BASE_TONE_HZ: u32 = 256;
const PLAYER_SIZE: i32 = 10;

/// Scrolling gradient with a player square and a sine tone
///
/// The left stick bends the tone and scrolls the gradient, the d-pad moves
/// the square, and A makes it jump. The mouse draws a cursor square.
pub struct GradientSimulation {
    tone_volume: i16,
}

impl GradientSimulation {
    pub fn new(tone_volume: i16) -> Self {
        Self { tone_volume }
    }

    fn load_state(arena: &Arena) -> DemoState {
        match arena.permanent().get(..DEMO_STATE_SIZE) {
            Some(bytes) => bytemuck::pod_read_unaligned(bytes),
            None => DemoState::default(),
        }
    }

    fn store_state(arena: &mut Arena, state: &DemoState) {
        if let Some(bytes) = arena.permanent_mut().get_mut(..DEMO_STATE_SIZE) {
            bytes.copy_from_slice(bytemuck::bytes_of(state));
        }
    }
}

fn draw_square(frame: &mut FrameBuffer, x: i32, y: i32, size: i32, color: u32) {
    let width = frame.width() as i32;
    let height = frame.height() as i32;
    let pixels = frame.pixels_mut();
    for py in y.max(0)..(y + size).min(height) {
        for px in x.max(0)..(x + size).min(width) {
            pixels[(py * width + px) as usize] = color;
        }
    }
}

impl Simulation for GradientSimulation {
    fn entry_points(&self) -> EntryPoints {
        EntryPoints::UPDATE_AND_RENDER | EntryPoints::GET_SOUND_SAMPLES
    }

    fn update_and_render(
        &mut self,
        arena: &mut Arena,
        input: &InputSample,
        frame: &mut FrameBuffer,
    ) {
        let mut state = Self::load_state(arena);
        if state.initialized == 0 {
            state = DemoState {
                initialized: 1,
                tone_hz: BASE_TONE_HZ,
                player_x: 100,
                player_y: 100,
                ..Default::default()
            };
        }

        let stick_x = input.left_stick_x as i32;
        let stick_y = input.left_stick_y as i32;
        state.tone_hz = (BASE_TONE_HZ as i32 + stick_x).max(32) as u32;
        state.x_offset = state.x_offset.wrapping_add(stick_x / 32);
        state.y_offset = state.y_offset.wrapping_sub(stick_y / 32);

        let step = 4;
        if input.is_pressed(button::LEFT) {
            state.player_x -= step;
        }
        if input.is_pressed(button::RIGHT) {
            state.player_x += step;
        }
        if input.is_pressed(button::UP) {
            state.player_y -= step;
        }
        if input.is_pressed(button::DOWN) {
            state.player_y += step;
        }
        if input.is_pressed(button::A) {
            state.player_y -= 2 * step;
        }

        let width = frame.width() as i32;
        for (y, row) in frame
            .pixels_mut()
            .chunks_exact_mut(width.max(1) as usize)
            .enumerate()
        {
            for (x, pixel) in row.iter_mut().enumerate() {
                let blue = (x as i32).wrapping_add(state.x_offset) as u8;
                let green = (y as i32).wrapping_add(state.y_offset) as u8;
                *pixel = pack_bgrx(0, green, blue);
            }
        }

        draw_square(
            frame,
            state.player_x,
            state.player_y,
            PLAYER_SIZE,
            pack_bgrx(0xFF, 0xFF, 0xFF),
        );
        let cursor_color = if input.mouse_buttons & mouse_button::LEFT != 0 {
            pack_bgrx(0xFF, 0x40, 0x40)
        } else {
            pack_bgrx(0x40, 0x40, 0x40)
        };
        draw_square(
            frame,
            input.mouse_x as i32,
            input.mouse_y as i32,
            PLAYER_SIZE / 2,
            cursor_color,
        );

        Self::store_state(arena, &state);
    }

    fn get_sound_samples(&mut self, arena: &mut Arena, sound: &mut SoundBuffer<'_>) {
        let mut state = Self::load_state(arena);
        if state.initialized == 0 || sound.samples_per_second == 0 {
            return;
        }

        let period = sound.samples_per_second as f32 / state.tone_hz.max(1) as f32;
        for frame in sound.samples.chunks_exact_mut(2) {
            let value = (state.t_sine.sin() * self.tone_volume as f32) as i16;
            frame[0] = value;
            frame[1] = value;
            state.t_sine += TAU / period;
            if state.t_sine > TAU {
                state.t_sine -= TAU;
            }
        }

        Self::store_state(arena, &state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sim: &mut GradientSimulation, arena: &mut Arena, input: InputSample) -> FrameBuffer {
        let mut frame = FrameBuffer::new(64, 48);
        sim.update_and_render(arena, &input, &mut frame);
        frame
    }

    #[test]
    fn test_state_lives_in_arena() {
        let mut sim = GradientSimulation::new(3000);
        let mut arena = Arena::new(1024, 1024);
        let right = InputSample {
            buttons: button::RIGHT,
            ..Default::default()
        };

        run(&mut sim, &mut arena, right);
        run(&mut sim, &mut arena, right);
        assert_eq!(GradientSimulation::load_state(&arena).player_x, 108);

        // A fresh instance continues from the same arena
        let mut reloaded = GradientSimulation::new(3000);
        run(&mut reloaded, &mut arena, right);
        assert_eq!(GradientSimulation::load_state(&arena).player_x, 112);
    }

    #[test]
    fn test_same_input_same_output() {
        let input = InputSample {
            left_stick_x: 90,
            left_stick_y: -64,
            buttons: button::A,
            ..Default::default()
        };
        let mut a = Arena::new(256, 0);
        let mut b = Arena::new(256, 0);
        let mut sim = GradientSimulation::new(3000);

        for _ in 0..5 {
            let fa = run(&mut sim, &mut a, input);
            let fb = run(&mut sim, &mut b, input);
            assert_eq!(fa, fb);
        }
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_tone_fills_stereo_and_advances_phase() {
        let mut sim = GradientSimulation::new(3000);
        let mut arena = Arena::new(256, 0);
        run(&mut sim, &mut arena, InputSample::default());

        let mut samples = vec![0i16; 96];
        sim.get_sound_samples(
            &mut arena,
            &mut SoundBuffer {
                samples_per_second: 48_000,
                samples: &mut samples,
            },
        );
        assert!(samples.chunks_exact(2).all(|f| f[0] == f[1]));
        assert!(samples.iter().any(|&s| s != 0));
        assert!(samples.iter().all(|&s| s.abs() <= 3000));
        assert!(GradientSimulation::load_state(&arena).t_sine > 0.0);
    }

    #[test]
    fn test_silent_before_first_update() {
        let mut sim = GradientSimulation::new(3000);
        let mut arena = Arena::new(256, 0);
        let mut samples = vec![0i16; 8];
        sim.get_sound_samples(
            &mut arena,
            &mut SoundBuffer {
                samples_per_second: 48_000,
                samples: &mut samples,
            },
        );
        assert_eq!(samples, vec![0; 8]);
    }

    #[test]
    fn test_square_clipped_at_edges() {
        let mut frame = FrameBuffer::new(4, 4);
        draw_square(&mut frame, -2, 2, 4, 7);
        assert_eq!(frame.pixels()[8], 7);
        assert_eq!(frame.pixels()[9], 7);
        assert_eq!(frame.pixels()[10], 0);
    }

    #[test]
    fn test_static_loader_never_stale() {
        let mut loader =
            StaticModuleLoader::new(|| Box::new(GradientSimulation::new(1000)) as Box<dyn Simulation>);
        let handle = loader.load();
        assert!(handle.is_loaded());
        assert!(!loader.should_reload(&handle));
    }
}
