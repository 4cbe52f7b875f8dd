//! Windowless runs for CI and quick smoke checks
//!
//! Audio goes to a [`VirtualDevice`] whose play cursor is moved by one
//! frame's worth of samples after every update, so the ring writer sees the
//! same cadence it would against real hardware.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use hotloop_core::config::Config;
use hotloop_core::{AudioDevice, FrameBuffer, FrameReport, InputSample, Presenter, VirtualDevice};

use crate::session;

/// Keeps a copy of the last presented frame
#[derive(Default)]
struct LastFrame {
    frame: Option<FrameBuffer>,
    presented: u64,
}

impl Presenter for LastFrame {
    fn present(&mut self, frame: &FrameBuffer) -> Result<()> {
        self.frame = Some(frame.clone());
        self.presented += 1;
        Ok(())
    }
}

/// Summary of a finished headless run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub presented: u64,
    pub reloads: u64,
    pub audio_frames: u64,
    pub skipped_audio_frames: u64,
}

impl RunSummary {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.audio_frames += u64::from(report.audio_frames);
        self.skipped_audio_frames += report.skipped_audio_frames;
        if report.reloaded {
            self.reloads += 1;
        }
    }
}

pub fn run(config: &Config, frames: u64, dump: Option<&Path>) -> Result<()> {
    let summary = run_frames(config, frames, dump)?;
    info!(
        "Headless run finished: {} frames ({} presented), {} reloads, {} audio frames written, {} skipped",
        summary.frames,
        summary.presented,
        summary.reloads,
        summary.audio_frames,
        summary.skipped_audio_frames
    );
    Ok(())
}

fn run_frames(config: &Config, frames: u64, dump: Option<&Path>) -> Result<RunSummary> {
    let rate = config.audio.sample_rate;
    let per_frame = (rate / config.timing.update_hz.max(1)) as usize;

    let mut clock_hand = None;
    let device = if config.audio.enabled {
        let device = VirtualDevice::new(config.audio.buffer_frames(rate), rate);
        clock_hand = Some(device.clone());
        Some(Box::new(device) as Box<dyn AudioDevice>)
    } else {
        None
    };

    let mut driver = session::build_driver(config, device)?;
    let mut presenter = LastFrame::default();
    let mut summary = RunSummary::default();

    for _ in 0..frames {
        let report = driver.run_frame(InputSample::default(), &[], &mut presenter);
        summary.record(&report);
        if let Some(hand) = clock_hand.as_mut() {
            hand.advance(per_frame);
        }
    }
    summary.presented = presenter.presented;

    if let Some(path) = dump {
        let frame = presenter.frame.as_ref().unwrap_or(driver.frame_buffer());
        write_png(frame, path)?;
        info!("Wrote frame {} to {}", driver.frame_count(), path.display());
    }

    Ok(summary)
}

fn write_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    let image = image::RgbaImage::from_raw(frame.width(), frame.height(), frame.to_rgba())
        .context("Frame buffer size does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.video.width = 32;
        config.video.height = 16;
        config.arena.permanent_bytes = 1024;
        config.arena.transient_bytes = 1024;
        config.replay.slot_dir = Some(dir.to_path_buf());
        config
    }

    #[test]
    fn test_headless_run_presents_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path());
        config.audio.enabled = false;

        let summary = run_frames(&config, 5, None).unwrap();
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.presented, 5);
        assert_eq!(summary.audio_frames, 0);
    }

    #[test]
    fn test_headless_audio_keeps_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());

        let summary = run_frames(&config, 30, None).unwrap();
        assert!(summary.audio_frames > 0);
        assert_eq!(summary.skipped_audio_frames, 0);
    }

    #[test]
    fn test_dump_frame_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path());
        config.audio.enabled = false;
        let path = dir.path().join("frame.png");

        run_frames(&config, 3, Some(&path)).unwrap();

        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (32, 16));
    }
}
