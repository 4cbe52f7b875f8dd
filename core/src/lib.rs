//! Hotloop core - frame-stepped harness for reloadable simulations
//!
//! This crate holds everything that does not need a window:
//!
//! - [`FrameDriver`] - Per-frame state machine (live, recording, playing)
//! - [`ModuleLoader`] - Reloadable simulation modules (WASM or in-process)
//! - [`AudioRingWriter`] - Keeps a circular audio buffer ahead of the play cursor
//! - [`snapshot`] - Whole-arena capture and restore
//! - [`ReplayDeck`] - Input recording and looping playback slots
//!
//! The simulation keeps all of its state in one [`Arena`], which is what
//! makes module reloads and replay snapshots plain byte operations.

pub mod arena;
pub mod audio;
pub mod clock;
pub mod config;
pub mod driver;
pub mod frame_buffer;
pub mod input;
pub mod module;
pub mod replay;
pub mod snapshot;

pub use arena::Arena;
pub use audio::{
    AudioDevice, AudioRegion, AudioRingWriter, CpalDevice, DeviceStatus, RingBufferState,
    VirtualDevice, WritePlan,
};
pub use clock::FrameClock;
pub use config::{Config, ConfigError};
pub use driver::{AudioOutput, DriverState, FrameDriver, FrameReport, Presenter};
pub use frame_buffer::FrameBuffer;
pub use input::{ControlEvent, ControlKeys, InputManager, InputSample};
pub use module::{
    EntryPoints, GradientSimulation, ModuleHandle, ModuleLoader, Simulation, SoundBuffer,
    StaticModuleLoader, WasmModuleLoader,
};
pub use replay::{ReplayDeck, ReplayError, ReplaySlot, SLOT_COUNT};
pub use snapshot::{Snapshot, SnapshotError};
