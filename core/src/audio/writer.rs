//! Per-frame audio ring writer

use tracing::{debug, warn};

use super::device::{AudioDevice, DeviceStatus};
use super::ring::{RingBufferState, WritePlan};
use super::CHANNELS;
use crate::config::ConfigError;

/// Keeps the device ring filled a fixed margin ahead of its play cursor
///
/// Each frame is a two-step exchange: [`plan`](Self::plan) reads the device
/// status and picks the byte range, the caller fills
/// [`samples`](Self::samples), then [`commit`](Self::commit) copies them into
/// the ring and advances the running sample index.
pub struct AudioRingWriter {
    state: RingBufferState,
    scratch: Vec<i16>,
}

impl AudioRingWriter {
    /// Create a writer for `device` with a look-ahead of `margin_frames`
    pub fn new(device: &dyn AudioDevice, margin_frames: u32) -> Result<Self, ConfigError> {
        let state = RingBufferState::new(
            device.capacity_bytes(),
            margin_frames,
            device.samples_per_second(),
        )?;
        debug!(
            "Audio ring: {} bytes, margin {} frames at {} Hz",
            state.capacity_bytes(),
            margin_frames,
            state.samples_per_second()
        );
        Ok(Self {
            state,
            scratch: Vec::new(),
        })
    }

    pub fn state(&self) -> &RingBufferState {
        &self.state
    }

    /// Decide what to write this frame
    ///
    /// Returns `None` when the device is lost; nothing advances in that case.
    pub fn plan(&mut self, status: DeviceStatus) -> Option<WritePlan> {
        let (play_cursor, playing) = match status {
            DeviceStatus::Lost => return None,
            DeviceStatus::Stopped { play_cursor } => (play_cursor, false),
            DeviceStatus::Playing { play_cursor } => (play_cursor, true),
        };
        let play_cursor = self.state.align_cursor(play_cursor);

        // A stopped device with nothing written gets exactly one margin of prefill
        let prefill = !playing && self.state.running_sample_index() == 0;

        let mut skipped_frames = 0;
        if !prefill && self.state.is_underrun(play_cursor) {
            skipped_frames = self.state.reanchor(play_cursor);
            warn!(
                "Audio underrun: play cursor {} overtook writer, skipped {} frames",
                play_cursor, skipped_frames
            );
        }

        let mut plan = self.state.plan(play_cursor);
        plan.skipped_frames = skipped_frames;
        plan.start_device = !playing;

        let sample_count = (plan.total_frames() * CHANNELS) as usize;
        self.scratch.clear();
        self.scratch.resize(sample_count, 0);
        Some(plan)
    }

    /// Zeroed interleaved buffer sized for the last plan
    pub fn samples(&mut self) -> &mut [i16] {
        &mut self.scratch
    }

    /// Copy the filled samples into the ring and advance the running index
    pub fn commit(&mut self, plan: &WritePlan, device: &mut dyn AudioDevice) {
        let mut written = 0usize;
        for region in plan.regions() {
            let count = (region.frames() * CHANNELS) as usize;
            let Some(chunk) = self.scratch.get(written..written + count) else {
                break;
            };
            device.write(region.offset, chunk);
            written += count;
        }
        self.state.advance((written / CHANNELS as usize) as u64);

        if plan.start_device {
            device.play();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VirtualDevice;

    fn setup() -> (VirtualDevice, AudioRingWriter) {
        // One second at 12 kHz, margin of 200 frames
        let device = VirtualDevice::new(12_000, 12_000);
        let writer = AudioRingWriter::new(&device, 200).unwrap();
        (device, writer)
    }

    fn run_frame(device: &mut VirtualDevice, writer: &mut AudioRingWriter, value: i16) -> Option<WritePlan> {
        let plan = writer.plan(device.status())?;
        writer.samples().fill(value);
        writer.commit(&plan, device);
        Some(plan)
    }

    #[test]
    fn test_prefill_then_start() {
        let (mut device, mut writer) = setup();
        let plan = run_frame(&mut device, &mut writer, 5).unwrap();

        assert!(plan.start_device);
        assert_eq!(plan.first.offset, 0);
        assert_eq!(plan.total_frames(), 200);
        assert_eq!(writer.state().running_sample_index(), 200);
        assert_eq!(device.status(), DeviceStatus::Playing { play_cursor: 0 });
        assert_eq!(device.frame(199), (5, 5));
        assert_eq!(device.frame(200), (0, 0));
    }

    #[test]
    fn test_steady_state_writes_what_was_consumed() {
        let (mut device, mut writer) = setup();
        run_frame(&mut device, &mut writer, 1);

        device.advance(150);
        let plan = run_frame(&mut device, &mut writer, 2).unwrap();
        assert!(!plan.start_device);
        assert_eq!(plan.skipped_frames, 0);
        assert_eq!(plan.first.offset, 800);
        assert_eq!(plan.total_frames(), 150);
        assert_eq!(writer.state().running_sample_index(), 350);
    }

    #[test]
    fn test_paused_device_restarts_without_prefill() {
        let (mut device, mut writer) = setup();
        run_frame(&mut device, &mut writer, 1);
        device.advance(50);
        device.pause();

        let plan = run_frame(&mut device, &mut writer, 4).unwrap();
        assert!(plan.start_device);
        assert_eq!(plan.skipped_frames, 0);
        // Tops up to the margin instead of starting over at the cursor
        assert_eq!(plan.first.offset, 800);
        assert_eq!(plan.total_frames(), 50);
        assert_eq!(writer.state().running_sample_index(), 250);
        assert_eq!(device.status(), DeviceStatus::Playing { play_cursor: 200 });
    }

    #[test]
    fn test_lost_device_skips_without_advancing() {
        let (mut device, mut writer) = setup();
        run_frame(&mut device, &mut writer, 1);
        device.lose();
        assert!(run_frame(&mut device, &mut writer, 1).is_none());
        assert_eq!(writer.state().running_sample_index(), 200);
    }

    #[test]
    fn test_underrun_reanchors_past_cursor() {
        let (mut device, mut writer) = setup();
        run_frame(&mut device, &mut writer, 1);

        // Reader runs through everything written and beyond
        device.advance(500);
        let plan = run_frame(&mut device, &mut writer, 3).unwrap();
        assert_eq!(plan.skipped_frames, 301);
        assert_eq!(plan.first.offset, 501 * 4);
        assert!(!plan.first.contains(500 * 4));
        assert_eq!(plan.total_frames(), 199);
        assert_eq!(writer.state().running_sample_index(), 200 + 301 + 199);
    }

    #[test]
    fn test_wrapped_commit_lands_in_both_regions() {
        let (mut device, mut writer) = setup();
        run_frame(&mut device, &mut writer, 1);

        // Walk the writer to near the end of the ring
        for _ in 0..59 {
            device.advance(199);
            run_frame(&mut device, &mut writer, 1);
        }
        let before = writer.state().running_sample_index();
        device.advance(199);
        let plan = run_frame(&mut device, &mut writer, 9).unwrap();

        let second = plan.second.expect("range should wrap");
        assert_eq!(plan.first.offset + plan.first.length, 48_000);
        assert_eq!(second.offset, 0);
        assert_eq!(device.frame(11_999), (9, 9));
        assert_eq!(device.frame(0), (9, 9));
        assert_eq!(
            writer.state().running_sample_index(),
            before + plan.total_frames() as u64
        );
    }
}
