//! Simulation backed by an instantiated WASM module

use anyhow::{Context, Result};
use tracing::warn;
use wasmtime::{Linker, Memory, Module, Store, TypedFunc};

use super::engine::WasmEngine;
use crate::arena::Arena;
use crate::frame_buffer::FrameBuffer;
use crate::input::{INPUT_SAMPLE_SIZE, InputSample};
use crate::module::{EntryPoints, Simulation, SoundBuffer};

/// `update_and_render(arena_ptr, arena_len, input_ptr, pixels_ptr, width, height, pitch)`
type UpdateParams = (i32, i32, i32, i32, i32, i32, i32);
/// `get_sound_samples(arena_ptr, arena_len, samples_ptr, sample_frames, samples_per_second)`
type SoundParams = (i32, i32, i32, i32, i32);

const WASM_PAGE_SIZE: usize = 65_536;

/// A byte range of guest memory reserved by the host
#[derive(Debug, Clone, Copy, Default)]
struct Region {
    offset: usize,
    len: usize,
}

/// A loaded module with the host's staging regions
///
/// The arena is host memory. Each call copies it into guest memory, runs the
/// export, and copies it back only if the export returned normally, so a
/// trapping module cannot leave the arena half-written.
pub struct WasmSimulation {
    store: Store<()>,
    memory: Memory,
    update_fn: Option<TypedFunc<UpdateParams, ()>>,
    sound_fn: Option<TypedFunc<SoundParams, ()>>,
    /// Arena followed by the input sample, reserved on first call
    state_region: Option<Region>,
    /// Pixels or samples, regrown when too small
    output_region: Region,
}

impl WasmSimulation {
    /// Instantiate `module` with no host imports
    pub fn new(engine: &WasmEngine, module: &Module) -> Result<Self> {
        let mut store = Store::new(engine.engine(), ());
        let linker = Linker::new(engine.engine());
        let instance = linker
            .instantiate(&mut store, module)
            .context("Failed to instantiate WASM module")?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .context("No memory export found")?;
        let update_fn = instance
            .get_typed_func::<UpdateParams, ()>(&mut store, "update_and_render")
            .ok();
        let sound_fn = instance
            .get_typed_func::<SoundParams, ()>(&mut store, "get_sound_samples")
            .ok();

        Ok(Self {
            store,
            memory,
            update_fn,
            sound_fn,
            state_region: None,
            output_region: Region::default(),
        })
    }

    /// Grow guest memory by at least `len` bytes and return the new range
    fn reserve(&mut self, len: usize) -> Result<Region> {
        let pages = len.div_ceil(WASM_PAGE_SIZE);
        let previous = self
            .memory
            .grow(&mut self.store, pages as u64)
            .context("Failed to grow guest memory")?;
        Ok(Region {
            offset: previous as usize * WASM_PAGE_SIZE,
            len: pages * WASM_PAGE_SIZE,
        })
    }

    /// Arena offset and input offset for an arena of `arena_len` bytes
    fn state_region(&mut self, arena_len: usize) -> Result<(usize, usize)> {
        let input_at = arena_len.next_multiple_of(16);
        let region = match self.state_region {
            Some(region) if region.len >= input_at + INPUT_SAMPLE_SIZE => region,
            _ => {
                let region = self.reserve(input_at + INPUT_SAMPLE_SIZE)?;
                self.state_region = Some(region);
                region
            }
        };
        Ok((region.offset, region.offset + input_at))
    }

    fn output_region(&mut self, len: usize) -> Result<usize> {
        if self.output_region.len < len {
            self.output_region = self.reserve(len)?;
        }
        Ok(self.output_region.offset)
    }

    fn try_update(
        &mut self,
        func: &TypedFunc<UpdateParams, ()>,
        arena: &mut Arena,
        input: &InputSample,
        frame: &mut FrameBuffer,
    ) -> Result<()> {
        let (arena_at, input_at) = self.state_region(arena.len())?;
        let pixels_at = self.output_region(frame.as_bytes().len())?;

        self.memory.write(&mut self.store, arena_at, arena.as_bytes())?;
        self.memory
            .write(&mut self.store, input_at, bytemuck::bytes_of(input))?;

        func.call(
            &mut self.store,
            (
                arena_at as i32,
                arena.len() as i32,
                input_at as i32,
                pixels_at as i32,
                frame.width() as i32,
                frame.height() as i32,
                frame.pitch() as i32,
            ),
        )?;

        self.memory.read(&self.store, arena_at, arena.as_bytes_mut())?;
        self.memory.read(&self.store, pixels_at, frame.as_bytes_mut())?;
        Ok(())
    }

    fn try_sound(
        &mut self,
        func: &TypedFunc<SoundParams, ()>,
        arena: &mut Arena,
        sound: &mut SoundBuffer<'_>,
    ) -> Result<()> {
        let (arena_at, _) = self.state_region(arena.len())?;
        let samples_at = self.output_region(std::mem::size_of_val(sound.samples))?;

        self.memory.write(&mut self.store, arena_at, arena.as_bytes())?;
        // Guest sees zeroed samples, same as native simulations
        self.memory
            .write(&mut self.store, samples_at, bytemuck::cast_slice(sound.samples))?;

        func.call(
            &mut self.store,
            (
                arena_at as i32,
                arena.len() as i32,
                samples_at as i32,
                sound.frame_count() as i32,
                sound.samples_per_second as i32,
            ),
        )?;

        self.memory.read(&self.store, arena_at, arena.as_bytes_mut())?;
        self.memory.read(
            &self.store,
            samples_at,
            bytemuck::cast_slice_mut(sound.samples),
        )?;
        Ok(())
    }

    /// Drop both entry points after a failed call
    fn disable(&mut self, export: &str, error: anyhow::Error) {
        warn!(
            "Simulation module failed in {}(): {:#}. Entry points disabled until the next reload.",
            export, error
        );
        self.update_fn = None;
        self.sound_fn = None;
    }
}

impl Simulation for WasmSimulation {
    fn entry_points(&self) -> EntryPoints {
        let mut entry_points = EntryPoints::empty();
        entry_points.set(EntryPoints::UPDATE_AND_RENDER, self.update_fn.is_some());
        entry_points.set(EntryPoints::GET_SOUND_SAMPLES, self.sound_fn.is_some());
        entry_points
    }

    fn update_and_render(
        &mut self,
        arena: &mut Arena,
        input: &InputSample,
        frame: &mut FrameBuffer,
    ) {
        let Some(func) = self.update_fn.clone() else {
            return;
        };
        if let Err(e) = self.try_update(&func, arena, input, frame) {
            self.disable("update_and_render", e);
        }
    }

    fn get_sound_samples(&mut self, arena: &mut Arena, sound: &mut SoundBuffer<'_>) {
        let Some(func) = self.sound_fn.clone() else {
            return;
        };
        if let Err(e) = self.try_sound(&func, arena, sound) {
            self.disable("get_sound_samples", e);
        }
    }
}
