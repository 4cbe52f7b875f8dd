//! Audio device seam and the shared frame ring

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::BYTES_PER_SAMPLE_FRAME;

/// What the device reports at the start of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Open but not consuming yet
    Stopped { play_cursor: u32 },
    /// Consuming; `play_cursor` is the byte offset being read
    Playing { play_cursor: u32 },
    /// The stream failed and will not recover
    Lost,
}

/// A circular output buffer read by hardware (or a stand-in)
pub trait AudioDevice {
    /// Ring size in bytes
    fn capacity_bytes(&self) -> u32;

    /// Actual output rate, which may differ from what was requested
    fn samples_per_second(&self) -> u32;

    fn status(&self) -> DeviceStatus;

    /// Copy interleaved stereo samples into the ring starting at `byte_offset`
    ///
    /// Writes past the end of the ring wrap to the start.
    fn write(&mut self, byte_offset: u32, samples: &[i16]);

    /// Begin consuming from the current play cursor
    fn play(&mut self);
}

/// Ring of packed stereo frames shared between the writer and a reader thread
///
/// Each slot holds one frame (left in the low half, right in the high half)
/// so a frame is never torn. Only the reader moves the cursor.
pub(crate) struct FrameRing {
    frames: Box<[AtomicU32]>,
    /// Read position in frames
    cursor: AtomicU32,
    playing: AtomicBool,
    lost: AtomicBool,
}

#[inline]
fn pack(left: i16, right: i16) -> u32 {
    (left as u16 as u32) | ((right as u16 as u32) << 16)
}

#[inline]
fn unpack(frame: u32) -> (i16, i16) {
    (frame as u16 as i16, (frame >> 16) as u16 as i16)
}

impl FrameRing {
    pub(crate) fn new(capacity_frames: u32) -> Self {
        Self {
            frames: (0..capacity_frames).map(|_| AtomicU32::new(0)).collect(),
            cursor: AtomicU32::new(0),
            playing: AtomicBool::new(false),
            lost: AtomicBool::new(false),
        }
    }

    pub(crate) fn capacity_bytes(&self) -> u32 {
        self.frames.len() as u32 * BYTES_PER_SAMPLE_FRAME
    }

    pub(crate) fn status(&self) -> DeviceStatus {
        if self.lost.load(Ordering::Acquire) {
            return DeviceStatus::Lost;
        }
        let play_cursor = self.cursor.load(Ordering::Acquire) * BYTES_PER_SAMPLE_FRAME;
        if self.playing.load(Ordering::Acquire) {
            DeviceStatus::Playing { play_cursor }
        } else {
            DeviceStatus::Stopped { play_cursor }
        }
    }

    pub(crate) fn write(&self, byte_offset: u32, samples: &[i16]) {
        let len = self.frames.len();
        if len == 0 {
            return;
        }
        let start = (byte_offset / BYTES_PER_SAMPLE_FRAME) as usize;
        for (i, pair) in samples.chunks_exact(2).enumerate() {
            self.frames[(start + i) % len].store(pack(pair[0], pair[1]), Ordering::Release);
        }
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
    }

    /// Read `frame_count` frames from the cursor and advance it
    ///
    /// Yields silence without moving when stopped or lost.
    pub(crate) fn consume(&self, frame_count: usize, mut out: impl FnMut(i16, i16)) {
        let len = self.frames.len();
        if len == 0 || !self.playing.load(Ordering::Acquire) || self.lost.load(Ordering::Acquire)
        {
            for _ in 0..frame_count {
                out(0, 0);
            }
            return;
        }
        let mut cursor = self.cursor.load(Ordering::Acquire) as usize;
        for _ in 0..frame_count {
            let (left, right) = unpack(self.frames[cursor].load(Ordering::Acquire));
            out(left, right);
            cursor = (cursor + 1) % len;
        }
        self.cursor.store(cursor as u32, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn frame(&self, index: usize) -> (i16, i16) {
        unpack(self.frames[index % self.frames.len()].load(Ordering::Acquire))
    }
}

/// Software device whose play cursor only moves when told to
///
/// Used for headless runs and tests. Clones share one ring, so a handle kept
/// outside the frame driver can move the cursor of the device it owns.
#[derive(Clone)]
pub struct VirtualDevice {
    ring: Arc<FrameRing>,
    samples_per_second: u32,
}

impl VirtualDevice {
    pub fn new(capacity_frames: u32, samples_per_second: u32) -> Self {
        Self {
            ring: Arc::new(FrameRing::new(capacity_frames)),
            samples_per_second,
        }
    }

    /// Consume `frames` frames as the hardware would, returning them interleaved
    pub fn advance(&mut self, frames: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(frames * 2);
        self.ring.consume(frames, |left, right| {
            out.push(left);
            out.push(right);
        });
        out
    }

    /// Simulate a device failure
    pub fn lose(&mut self) {
        self.ring.mark_lost();
    }

    /// Stop consuming without moving the cursor
    pub fn pause(&mut self) {
        self.ring.set_playing(false);
    }

    #[cfg(test)]
    pub(crate) fn frame(&self, index: usize) -> (i16, i16) {
        self.ring.frame(index)
    }
}

impl AudioDevice for VirtualDevice {
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
