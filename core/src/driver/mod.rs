//! Frame driver
//!
//! Owns every piece of per-run state and steps it one frame at a time:
//!
//! 1. apply record/playback/slot control events
//! 2. pick the effective input (raw, recorded, or replayed)
//! 3. swap in a newer module build if there is one
//! 4. update and render
//! 5. plan the audio write and let the module fill it
//! 6. present the frame and commit the audio
//!
//! The driver never blocks or sleeps; pacing belongs to the caller
//! (see [`FrameClock`](crate::clock::FrameClock)).

mod state;

pub use state::DriverState;

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::arena::Arena;
use crate::audio::{AudioDevice, AudioRingWriter, WritePlan};
use crate::config::ConfigError;
use crate::frame_buffer::FrameBuffer;
use crate::input::{ControlEvent, InputSample};
use crate::module::{ModuleHandle, ModuleLoader, SoundBuffer};
use crate::replay::{ReplayDeck, ReplayError, slot_index};

/// Receives the finished frame buffer once per frame
pub trait Presenter {
    fn present(&mut self, frame: &FrameBuffer) -> anyhow::Result<()>;
}

/// Audio device plus the writer that feeds it
pub struct AudioOutput {
    device: Box<dyn AudioDevice>,
    writer: AudioRingWriter,
}

impl AudioOutput {
    pub fn new(device: Box<dyn AudioDevice>, margin_frames: u32) -> Result<Self, ConfigError> {
        let writer = AudioRingWriter::new(device.as_ref(), margin_frames)?;
        Ok(Self { device, writer })
    }

    pub fn device(&self) -> &dyn AudioDevice {
        self.device.as_ref()
    }

    pub fn writer(&self) -> &AudioRingWriter {
        &self.writer
    }
}

/// What happened during one call to [`FrameDriver::run_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// Index of the frame that just ran, from 0
    pub frame: u64,
    /// State after control events were applied
    pub state: DriverState,
    /// Input delivered to the module
    pub input: InputSample,
    /// A newer module build was swapped in
    pub reloaded: bool,
    /// Stereo frames written to the audio ring
    pub audio_frames: u32,
    /// Frames skipped to recover from an underrun
    pub skipped_audio_frames: u64,
}

/// Per-frame state machine over the arena, module, replay slots and audio
pub struct FrameDriver {
    arena: Arena,
    loader: Box<dyn ModuleLoader>,
    handle: ModuleHandle,
    deck: ReplayDeck,
    audio: Option<AudioOutput>,
    frame: FrameBuffer,
    state: DriverState,
    selected_slot: u8,
    slot_dir: Option<PathBuf>,
    frame_index: u64,
}

impl FrameDriver {
    /// Create a driver and load the first module build
    pub fn new(arena: Arena, mut loader: Box<dyn ModuleLoader>, frame: FrameBuffer) -> Self {
        let handle = loader.load();
        if !handle.is_loaded() {
            warn!("No simulation module loaded yet; running without one");
        }
        Self {
            arena,
            loader,
            handle,
            deck: ReplayDeck::new(),
            audio: None,
            frame,
            state: DriverState::Live,
            selected_slot: 1,
            slot_dir: None,
            frame_index: 0,
        }
    }

    /// Attach an audio output
    pub fn with_audio(mut self, audio: AudioOutput) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Persist finished recordings to `dir` and load any slots already there
    pub fn with_slot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.deck.load_dir(&dir, self.arena.len());
        self.slot_dir = Some(dir);
        self
    }

    /// Choose the slot the next record or playback toggle starts
    pub fn select_slot(&mut self, slot: u8) -> Result<(), ReplayError> {
        slot_index(slot)?;
        self.selected_slot = slot;
        Ok(())
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn selected_slot(&self) -> u8 {
        self.selected_slot
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn deck(&self) -> &ReplayDeck {
        &self.deck
    }

    pub fn handle(&self) -> &ModuleHandle {
        &self.handle
    }

    pub fn audio(&self) -> Option<&AudioOutput> {
        self.audio.as_ref()
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Number of frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// Follow a window resize; the next frame renders at the new size
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.frame.resize(width, height) {
            debug!("Frame buffer resized to {}x{}", width, height);
        }
    }

    /// Run one frame
    pub fn run_frame(
        &mut self,
        raw: InputSample,
        controls: &[ControlEvent],
        presenter: &mut dyn Presenter,
    ) -> FrameReport {
        for &event in controls {
            self.apply_control(event);
        }

        let input = self.effective_input(raw);
        let reloaded = self.reload_if_stale();

        self.handle
            .update_and_render(&mut self.arena, &input, &mut self.frame);

        let plan = self.fill_audio();

        if let Err(e) = presenter.present(&self.frame) {
            warn!("Failed to present frame {}: {:#}", self.frame_index, e);
        }

        let mut report = FrameReport {
            frame: self.frame_index,
            state: self.state,
            input,
            reloaded,
            ..Default::default()
        };
        if let (Some(plan), Some(audio)) = (plan, self.audio.as_mut()) {
            audio.writer.commit(&plan, audio.device.as_mut());
            report.audio_frames = plan.total_frames();
            report.skipped_audio_frames = plan.skipped_frames;
        }

        self.frame_index += 1;
        report
    }

    /// Raw input, recorded or replaced by the replay depending on state
    fn effective_input(&mut self, raw: InputSample) -> InputSample {
        match self.state {
            DriverState::Live => raw,
            DriverState::Recording(slot) => {
                if let Err(e) = self.deck.record_sample(slot, raw) {
                    warn!("Recording into slot {} failed: {}", slot, e);
                    self.state = DriverState::Live;
                }
                raw
            }
            DriverState::Playing(slot) => match self.deck.next_sample(slot, &mut self.arena) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("Playback of slot {} failed: {}", slot, e);
                    if self.deck.playing_slot() == Some(slot) {
                        let _ = self.deck.stop_playback(slot);
                    }
                    self.state = DriverState::Live;
                    raw
                }
            },
        }
    }

    /// Swap in a newer build; returns whether one was loaded
    fn reload_if_stale(&mut self) -> bool {
        if !self.loader.should_reload(&self.handle) {
            return false;
        }
        let before = self.handle.source_time();
        let current = std::mem::take(&mut self.handle);
        self.handle = self.loader.reload(current);
        self.handle.is_loaded() && self.handle.source_time() != before
    }

    /// Plan this frame's audio write and let the module fill it
    fn fill_audio(&mut self) -> Option<WritePlan> {
        let audio = self.audio.as_mut()?;
        let Some(plan) = audio.writer.plan(audio.device.status()) else {
            debug!("Audio device not ready, skipping audio this frame");
            return None;
        };
        let mut sound = SoundBuffer {
            samples_per_second: plan.first.format.samples_per_second,
            samples: audio.writer.samples(),
        };
        self.handle.get_sound_samples(&mut self.arena, &mut sound);
        Some(plan)
    }
}
