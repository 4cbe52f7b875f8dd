//! Audio output using cpal

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use super::device::{AudioDevice, DeviceStatus, FrameRing};

/// Default output device reading from a [`FrameRing`]
///
/// The stream runs from construction and emits silence until
/// [`AudioDevice::play`] is called, so the play cursor stays put during the
/// initial fill.
pub struct CpalDevice {
    ring: Arc<FrameRing>,
    /// The cpal stream (kept alive for the duration)
    _stream: cpal::Stream,
    samples_per_second: u32,
}

impl CpalDevice {
    /// Open the default output device with a ring of `buffer_ms` milliseconds
    pub fn new(requested_rate: u32, buffer_ms: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No audio output device available")?;

        let config = pick_config(&device, requested_rate)?;
        let samples_per_second = config.sample_rate().0;
        let channels = config.channels() as usize;
        if samples_per_second != requested_rate {
            info!(
                "Audio device does not support {} Hz, using {} Hz",
                requested_rate, samples_per_second
            );
        }

        let capacity_frames = (samples_per_second as u64 * buffer_ms as u64 / 1000) as u32;
        let ring = Arc::new(FrameRing::new(capacity_frames));

        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();
        let error_ring = Arc::clone(&ring);
        let on_error = move |err: cpal::StreamError| {
            error!("Audio stream error: {}", err);
            error_ring.mark_lost();
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let ring = Arc::clone(&ring);
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        fill(&ring, data, channels, 0.0, |s| s as f32 / 32768.0);
                    },
                    on_error,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let ring = Arc::clone(&ring);
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        fill(&ring, data, channels, 0, |s| s);
                    },
                    on_error,
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let ring = Arc::clone(&ring);
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                        // 0x8000 is silence for u16 audio
                        fill(&ring, data, channels, 32768, |s| (s as i32 + 32768) as u16);
                    },
                    on_error,
                    None,
                )
            }
            other => bail!("Unsupported sample format: {:?}", other),
        }
        .context("Failed to build audio stream")?;

        stream.play().context("Failed to start audio stream")?;
        debug!(
            "Audio stream open: {} Hz, {} channels, {} frame ring",
            samples_per_second, channels, capacity_frames
        );

        Ok(Self {
            ring,
            _stream: stream,
            samples_per_second,
        })
    }
}

/// Prefer a stereo config at the requested rate, else the device default
fn pick_config(device: &cpal::Device, requested_rate: u32) -> Result<cpal::SupportedStreamConfig> {
    let wanted = cpal::SampleRate(requested_rate);
    if let Ok(mut ranges) = device.supported_output_configs()
        && let Some(range) = ranges.find(|range| {
            range.channels() == 2
                && range.min_sample_rate() <= wanted
                && wanted <= range.max_sample_rate()
                && matches!(
                    range.sample_format(),
                    cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16
                )
        })
    {
        return Ok(range.with_sample_rate(wanted));
    }

    device
        .default_output_config()
        .context("Failed to get default output config")
}

/// Copy frames from the ring into an interleaved device buffer of any channel count
fn fill<T: Copy>(
    ring: &FrameRing,
    data: &mut [T],
    channels: usize,
    silence: T,
    convert: impl Fn(i16) -> T,
) {
    if channels == 0 {
        return;
    }
    let mut frames = data.chunks_exact_mut(channels);
    let frame_count = frames.len();
    ring.consume(frame_count, |left, right| {
        let Some(frame) = frames.next() else {
            return;
        };
        if channels == 1 {
            frame[0] = convert(((left as i32 + right as i32) / 2) as i16);
            return;
        }
        frame[0] = convert(left);
        frame[1] = convert(right);
        frame[2..].fill(silence);
    });
}

impl AudioDevice for CpalDevice {
    fn capacity_bytes(&self) -> u32 {
        self.ring.capacity_bytes()
    }

    fn samples_per_second(&self) -> u32 {
        self.samples_per_second
    }

    fn status(&self) -> DeviceStatus {
        self.ring.status()
    }

    fn write(&mut self, byte_offset: u32, samples: &[i16]) {
        self.ring.write(byte_offset, samples);
    }

    fn play(&mut self) {
        self.ring.set_playing(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_stereo_and_surround() {
        let ring = FrameRing::new(4);
        ring.write(0, &[100, -100, 200, -200]);
        ring.set_playing(true);

        let mut stereo = [0i16; 4];
        fill(&ring, &mut stereo, 2, 0, |s| s);
        assert_eq!(stereo, [100, -100, 200, -200]);

        let mut surround = [9i16; 8];
        fill(&ring, &mut surround, 4, 0, |s| s);
        // Ring positions 2 and 3 were never written
        assert_eq!(surround, [0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fill_mono_and_u16() {
        let ring = FrameRing::new(2);
        ring.write(0, &[100, 300, -32768, -32768]);
        ring.set_playing(true);

        let mut mono = [0u16; 2];
        fill(&ring, &mut mono, 1, 32768, |s| (s as i32 + 32768) as u16);
        assert_eq!(mono, [32768 + 200, 0]);
    }

    #[test]
    fn test_fill_silence_when_stopped() {
        let ring = FrameRing::new(2);
        ring.write(0, &[5, 5, 5, 5]);

        let mut data = [1.0f32; 4];
        fill(&ring, &mut data, 2, 0.0, |s| s as f32 / 32768.0);
        assert_eq!(data, [0.0; 4]);
    }
}
