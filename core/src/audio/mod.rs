//! Audio output through a circular buffer that runs ahead of the play cursor
//!
//! The device consumes a fixed-size ring on its own thread. Once per frame
//! [`AudioRingWriter`] asks the device where it is reading, works out which
//! bytes are safe to overwrite, lets the simulation fill them, and writes
//! them back. There is no locking between the two sides: the writer simply
//! never touches bytes between the play cursor and the previous write.

mod device;
mod output;
mod ring;
mod writer;

pub use device::{AudioDevice, DeviceStatus, VirtualDevice};
pub use output::CpalDevice;
pub use ring::{RingBufferState, WritePlan};
pub use writer::AudioRingWriter;

/// Interleaved channels per sample frame
pub const CHANNELS: u32 = 2;

/// Bytes per interleaved stereo frame of signed 16-bit samples
pub const BYTES_PER_SAMPLE_FRAME: u32 = CHANNELS * std::mem::size_of::<i16>() as u32;

/// Format of every region handed to the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u32,
    pub samples_per_second: u32,
}

impl AudioFormat {
    /// Stereo signed 16-bit at the given rate
    pub fn stereo_i16(samples_per_second: u32) -> Self {
        Self {
            channels: CHANNELS,
            samples_per_second,
        }
    }
}

/// A contiguous byte range of the device ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRegion {
    /// Byte offset into the ring
    pub offset: u32,
    /// Length in bytes (a whole number of sample frames)
    pub length: u32,
    pub format: AudioFormat,
}

impl AudioRegion {
    /// Number of stereo frames covered
    pub fn frames(&self) -> u32 {
        self.length / BYTES_PER_SAMPLE_FRAME
    }

    /// Check if `byte` falls inside this region
    pub fn contains(&self, byte: u32) -> bool {
        byte >= self.offset && byte - self.offset < self.length
    }
}
