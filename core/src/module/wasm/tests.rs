//! Tests for WASM engine, simulation instances and the file loader

use super::*;
use crate::arena::Arena;
use crate::frame_buffer::FrameBuffer;
use crate::input::{InputSample, button};
use crate::module::{EntryPoints, SoundBuffer};
use std::time::Duration;

/// Increments arena[0], copies the low button byte into arena[1], writes the first pixel
/// and fills every sample with 1000.
const COUNTER_WAT: &str = r#"
(module
    (memory (export "memory") 1)
    (func (export "update_and_render")
        (param $arena i32) (param $len i32) (param $input i32) (param $pixels i32)
        (param $w i32) (param $h i32) (param $pitch i32)
        (i32.store8 (local.get $arena)
            (i32.add (i32.load8_u (local.get $arena)) (i32.const 1)))
        (i32.store8 (i32.add (local.get $arena) (i32.const 1))
            (i32.load8_u (local.get $input)))
        (i32.store (local.get $pixels) (i32.const 0x00FF00FF)))
    (func (export "get_sound_samples")
        (param $arena i32) (param $len i32) (param $samples i32) (param $frames i32) (param $rate i32)
        (local $i i32)
        (block $done
            (loop $next
                (br_if $done (i32.ge_u (local.get $i) (i32.mul (local.get $frames) (i32.const 2))))
                (i32.store16
                    (i32.add (local.get $samples) (i32.shl (local.get $i) (i32.const 1)))
                    (i32.const 1000))
                (local.set $i (i32.add (local.get $i) (i32.const 1)))
                (br $next))))
)
"#;

/// Second build: adds 10 to arena[0] instead of 1, no sound
const COUNTER_V2_WAT: &str = r#"
(module
    (memory (export "memory") 1)
    (func (export "update_and_render")
        (param $arena i32) (param $len i32) (param $input i32) (param $pixels i32)
        (param $w i32) (param $h i32) (param $pitch i32)
        (i32.store8 (local.get $arena)
            (i32.add (i32.load8_u (local.get $arena)) (i32.const 10))))
)
"#;

/// Writes into the arena, then traps
const TRAPPING_WAT: &str = r#"
(module
    (memory (export "memory") 1)
    (func (export "update_and_render")
        (param $arena i32) (param $len i32) (param $input i32) (param $pixels i32)
        (param $w i32) (param $h i32) (param $pitch i32)
        (i32.store8 (local.get $arena) (i32.const 99))
        unreachable)
)
"#;

fn instantiate(wat: &str) -> WasmSimulation {
    let engine = WasmEngine::new().unwrap();
    let wasm = wat::parse_str(wat).unwrap();
    let module = engine.load_module(&wasm).unwrap();
    WasmSimulation::new(&engine, &module).unwrap()
}

fn write_module(path: &std::path::Path, wat: &str, modified: SystemTime) {
    std::fs::write(path, wat::parse_str(wat).unwrap()).unwrap();
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

/// Whole seconds so coarse filesystem timestamps compare equal
fn past_whole_second() -> SystemTime {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    SystemTime::UNIX_EPOCH + Duration::from_secs(now - 60)
}

// ============================================================================
// WasmEngine Tests
// ============================================================================

#[test]
fn test_wasm_engine_creation() {
    assert!(WasmEngine::new().is_ok());
}

#[test]
fn test_wasm_engine_load_invalid_module() {
    let engine = WasmEngine::new().unwrap();
    assert!(engine.load_module(b"not valid wasm").is_err());
}

#[test]
fn test_wasm_engine_requires_memory_export() {
    let engine = WasmEngine::new().unwrap();
    let wasm = wat::parse_str("(module)").unwrap();
    assert!(engine.load_module(&wasm).is_err());

    let wasm = wat::parse_str(r#"(module (memory (export "memory") 1))"#).unwrap();
    assert!(engine.load_module(&wasm).is_ok());
}

// ============================================================================
// WasmSimulation Tests
// ============================================================================

#[test]
fn test_entry_points_are_optional() {
    let sim = instantiate(r#"(module (memory (export "memory") 1))"#);
    assert_eq!(sim.entry_points(), EntryPoints::empty());

    let sim = instantiate(COUNTER_WAT);
    assert_eq!(
        sim.entry_points(),
        EntryPoints::UPDATE_AND_RENDER | EntryPoints::GET_SOUND_SAMPLES
    );
}

#[test]
fn test_update_round_trips_arena_input_and_pixels() {
    let mut sim = instantiate(COUNTER_WAT);
    let mut arena = Arena::new(100_000, 1000);
    let mut frame = FrameBuffer::new(8, 4);
    let input = InputSample {
        buttons: button::A | button::UP,
        ..Default::default()
    };

    sim.update_and_render(&mut arena, &input, &mut frame);
    sim.update_and_render(&mut arena, &input, &mut frame);

    assert_eq!(arena.as_bytes()[0], 2);
    assert_eq!(arena.as_bytes()[1], (button::A | button::UP) as u8);
    assert_eq!(frame.pixels()[0], 0x00FF00FF);
    assert_eq!(frame.pixels()[1], 0);
}

#[test]
fn test_sound_fills_samples() {
    let mut sim = instantiate(COUNTER_WAT);
    let mut arena = Arena::new(16, 16);
    let mut samples = vec![0i16; 800];

    sim.get_sound_samples(
        &mut arena,
        &mut SoundBuffer {
            samples_per_second: 48_000,
            samples: &mut samples,
        },
    );
    assert!(samples.iter().all(|&s| s == 1000));
}

#[test]
fn test_output_region_grows_with_frame_size() {
    let mut sim = instantiate(COUNTER_WAT);
    let mut arena = Arena::new(16, 16);
    let input = InputSample::default();

    let mut small = FrameBuffer::new(2, 2);
    sim.update_and_render(&mut arena, &input, &mut small);

    // Larger than one wasm page
    let mut large = FrameBuffer::new(256, 256);
    sim.update_and_render(&mut arena, &input, &mut large);
    assert_eq!(large.pixels()[0], 0x00FF00FF);
    assert_eq!(arena.as_bytes()[0], 2);
    assert!(sim.entry_points().contains(EntryPoints::UPDATE_AND_RENDER));
}

#[test]
fn test_trap_leaves_arena_untouched_and_disables_entry_points() {
    let mut sim = instantiate(TRAPPING_WAT);
    let mut arena = Arena::new(8, 8);
    let mut frame = FrameBuffer::new(2, 2);

    sim.update_and_render(&mut arena, &InputSample::default(), &mut frame);
    assert_eq!(arena.as_bytes()[0], 0);
    assert_eq!(sim.entry_points(), EntryPoints::empty());

    // Further calls are no-ops
    sim.update_and_render(&mut arena, &InputSample::default(), &mut frame);
    assert_eq!(arena.as_bytes()[0], 0);
}

// ============================================================================
// WasmModuleLoader Tests
// ============================================================================

#[test]
fn test_loader_reloads_on_newer_timestamp_and_keeps_arena() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.wasm");
    let t0 = past_whole_second();
    write_module(&path, COUNTER_WAT, t0);

    let mut loader = WasmModuleLoader::new(&path).unwrap();
    let mut handle = loader.load();
    assert!(handle.is_loaded());
    assert!(!loader.should_reload(&handle));

    let mut arena = Arena::new(16, 16);
    let mut frame = FrameBuffer::new(2, 2);
    handle.update_and_render(&mut arena, &InputSample::default(), &mut frame);
    assert_eq!(arena.as_bytes()[0], 1);

    write_module(&path, COUNTER_V2_WAT, t0 + Duration::from_secs(5));
    assert!(loader.should_reload(&handle));

    let mut handle = loader.reload(handle);
    assert!(!loader.should_reload(&handle));
    assert_eq!(handle.entry_points(), EntryPoints::UPDATE_AND_RENDER);

    handle.update_and_render(&mut arena, &InputSample::default(), &mut frame);
    assert_eq!(arena.as_bytes()[0], 11);
}

#[test]
fn test_loader_missing_file_gives_absent_handle() {
    let dir = tempfile::tempdir().unwrap();
    let mut loader = WasmModuleLoader::new(dir.path().join("missing.wasm")).unwrap();

    let handle = loader.load();
    assert!(!handle.is_loaded());
    assert_eq!(handle.source_time(), None);
    assert!(!loader.should_reload(&handle));
}

#[test]
fn test_loader_broken_build_keeps_old_handle_until_fixed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.wasm");
    let t0 = past_whole_second();
    write_module(&path, COUNTER_WAT, t0);

    let mut loader = WasmModuleLoader::new(&path).unwrap();
    let handle = loader.load();

    // Half-written build
    std::fs::write(&path, b"\0asm\x01").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(t0 + Duration::from_secs(1))
        .unwrap();
    assert!(loader.should_reload(&handle));

    let handle = loader.reload(handle);
    assert!(handle.is_loaded());
    assert_eq!(handle.source_time(), Some(t0));
    // Same broken build is not recompiled every frame
    assert!(!loader.should_reload(&handle));

    write_module(&path, COUNTER_V2_WAT, t0 + Duration::from_secs(2));
    let handle = loader.reload(handle);
    assert_eq!(handle.source_time(), Some(t0 + Duration::from_secs(2)));
    assert!(!loader.should_reload(&handle));
}

#[test]
fn test_loader_retries_failed_first_load_only_after_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.wasm");
    let t0 = past_whole_second();
    std::fs::write(&path, b"not wasm").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(t0)
        .unwrap();

    let mut loader = WasmModuleLoader::new(&path).unwrap();
    let handle = loader.load();
    assert!(!handle.is_loaded());
    assert!(!loader.should_reload(&handle));

    write_module(&path, COUNTER_WAT, t0 + Duration::from_secs(1));
    assert!(loader.should_reload(&handle));
    let handle = loader.reload(handle);
    assert!(handle.is_loaded());
}
