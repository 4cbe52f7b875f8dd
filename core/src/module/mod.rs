//! Reloadable simulation modules
//!
//! A [`ModuleLoader`] produces [`ModuleHandle`]s. The handle owns whatever
//! was loaded and exposes the two entry points the frame loop calls. The arena
//! lives outside the handle, so dropping one handle and loading the next keeps
//! every byte of simulation state.

mod builtin;
mod wasm;

pub use builtin::{GradientSimulation, StaticModuleLoader};
pub use wasm::{WasmEngine, WasmModuleLoader, WasmSimulation};

use std::time::SystemTime;

use bitflags::bitflags;

use crate::arena::Arena;
use crate::frame_buffer::FrameBuffer;
use crate::input::InputSample;

bitflags! {
    /// Entry points a loaded module provides
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryPoints: u8 {
        const UPDATE_AND_RENDER = 1 << 0;
        const GET_SOUND_SAMPLES = 1 << 1;
    }
}

/// Interleaved stereo samples the simulation fills for one frame
pub struct SoundBuffer<'a> {
    pub samples_per_second: u32,
    /// Zeroed on entry; left/right interleaved
    pub samples: &'a mut [i16],
}

impl SoundBuffer<'_> {
    /// Number of stereo frames to produce
    pub fn frame_count(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Simulation logic callable once per frame
///
/// Both methods default to doing nothing, which is how a missing entry point
/// behaves.
pub trait Simulation {
    /// Which entry points are live
    fn entry_points(&self) -> EntryPoints;

    /// Advance one frame and draw into `frame`
    fn update_and_render(
        &mut self,
        _arena: &mut Arena,
        _input: &InputSample,
        _frame: &mut FrameBuffer,
    ) {
    }

    /// Fill `sound` with the next `sound.frame_count()` frames of audio
    fn get_sound_samples(&mut self, _arena: &mut Arena, _sound: &mut SoundBuffer<'_>) {}
}

/// The currently loaded simulation plus the source timestamp it was loaded from
///
/// An absent handle (failed load) has no simulation and no timestamp.
#[derive(Default)]
pub struct ModuleHandle {
    simulation: Option<Box<dyn Simulation>>,
    source_time: Option<SystemTime>,
}

impl ModuleHandle {
    pub fn new(simulation: Box<dyn Simulation>, source_time: Option<SystemTime>) -> Self {
        Self {
            simulation: Some(simulation),
            source_time,
        }
    }

    /// Handle with no entry points
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn source_time(&self) -> Option<SystemTime> {
        self.source_time
    }

    pub fn entry_points(&self) -> EntryPoints {
        self.simulation
            .as_ref()
            .map_or(EntryPoints::empty(), |sim| sim.entry_points())
    }

    /// Call update-and-render if present
    pub fn update_and_render(
        &mut self,
        arena: &mut Arena,
        input: &InputSample,
        frame: &mut FrameBuffer,
    ) {
        if let Some(sim) = self.simulation.as_mut()
            && sim.entry_points().contains(EntryPoints::UPDATE_AND_RENDER)
        {
            sim.update_and_render(arena, input, frame);
        }
    }

    /// Call get-sound-samples if present
    pub fn get_sound_samples(&mut self, arena: &mut Arena, sound: &mut SoundBuffer<'_>) {
        if let Some(sim) = self.simulation.as_mut()
            && sim.entry_points().contains(EntryPoints::GET_SOUND_SAMPLES)
        {
            sim.get_sound_samples(arena, sound);
        }
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("entry_points", &self.entry_points())
            .field("source_time", &self.source_time)
            .finish()
    }
}

/// Source of simulation modules
pub trait ModuleLoader {
    /// Load the current build. Never fails; a failed load yields [`ModuleHandle::absent`].
    fn load(&mut self) -> ModuleHandle;

    /// Whether the build on disk is newer than what `handle` was loaded from
    fn should_reload(&self, handle: &ModuleHandle) -> bool;

    /// Release whatever `handle` holds
    fn unload(&mut self, handle: ModuleHandle) {
        drop(handle);
    }

    /// Swap in the current build
    ///
    /// The new build is loaded before the old one is released; if it fails
    /// to load, `current` is returned unchanged and stays in use.
    fn reload(&mut self, current: ModuleHandle) -> ModuleHandle {
        let next = self.load();
        if next.is_loaded() {
            self.unload(current);
            next
        } else {
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    impl Simulation for Counter {
        fn entry_points(&self) -> EntryPoints {
            EntryPoints::UPDATE_AND_RENDER
        }

        fn update_and_render(&mut self, arena: &mut Arena, _: &InputSample, _: &mut FrameBuffer) {
            arena.as_bytes_mut()[0] += 1;
        }

        fn get_sound_samples(&mut self, _: &mut Arena, sound: &mut SoundBuffer<'_>) {
            sound.samples.fill(1);
        }
    }

    #[test]
    fn test_absent_handle_is_a_no_op() {
        let mut handle = ModuleHandle::absent();
        let mut arena = Arena::new(4, 0);
        let mut frame = FrameBuffer::new(2, 2);
        let mut samples = [0i16; 4];

        handle.update_and_render(&mut arena, &InputSample::default(), &mut frame);
        handle.get_sound_samples(
            &mut arena,
            &mut SoundBuffer {
                samples_per_second: 48_000,
                samples: &mut samples,
            },
        );
        assert!(!handle.is_loaded());
        assert_eq!(handle.entry_points(), EntryPoints::empty());
        assert_eq!(arena.as_bytes(), &[0; 4]);
    }

    #[test]
    fn test_only_declared_entry_points_run() {
        let mut handle = ModuleHandle::new(Box::new(Counter), None);
        let mut arena = Arena::new(4, 0);
        let mut frame = FrameBuffer::new(2, 2);
        let mut samples = [0i16; 4];

        handle.update_and_render(&mut arena, &InputSample::default(), &mut frame);
        handle.get_sound_samples(
            &mut arena,
            &mut SoundBuffer {
                samples_per_second: 48_000,
                samples: &mut samples,
            },
        );
        assert_eq!(arena.as_bytes()[0], 1);
        assert_eq!(samples, [0; 4]);
    }

    struct FlakyLoader {
        succeed: bool,
        loads: u32,
    }

    impl ModuleLoader for FlakyLoader {
        fn load(&mut self) -> ModuleHandle {
            self.loads += 1;
            if self.succeed {
                ModuleHandle::new(Box::new(Counter), Some(SystemTime::now()))
            } else {
                ModuleHandle::absent()
            }
        }

        fn should_reload(&self, _: &ModuleHandle) -> bool {
            true
        }
    }

    #[test]
    fn test_failed_reload_keeps_previous_handle() {
        let mut loader = FlakyLoader {
            succeed: true,
            loads: 0,
        };
        let handle = loader.load();
        let loaded_at = handle.source_time();

        loader.succeed = false;
        let handle = loader.reload(handle);
        assert!(handle.is_loaded());
        assert_eq!(handle.source_time(), loaded_at);
        assert_eq!(loader.loads, 2);
    }
}
