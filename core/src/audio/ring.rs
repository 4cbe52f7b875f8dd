//! Ring buffer position arithmetic

use super::{AudioFormat, AudioRegion, BYTES_PER_SAMPLE_FRAME};
use crate::config::ConfigError;

/// Writer-side bookkeeping for the device ring
///
/// `running_sample_index` counts every stereo frame ever written and is
/// never reset; the physical write position is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBufferState {
    capacity_bytes: u32,
    running_sample_index: u64,
    bytes_per_frame: u32,
    margin_frames: u32,
    samples_per_second: u32,
}

/// Where to write this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePlan {
    /// From the write position towards the buffer end
    pub first: AudioRegion,
    /// From the buffer start, present only when the range wraps
    pub second: Option<AudioRegion>,
    /// Frames jumped over to get back ahead of the play cursor
    pub skipped_frames: u64,
    /// Device is stopped and should start once this write lands
    pub start_device: bool,
}

impl WritePlan {
    /// Total bytes across both regions
    pub fn total_bytes(&self) -> u32 {
        self.first.length + self.second.map_or(0, |r| r.length)
    }

    /// Total stereo frames across both regions
    pub fn total_frames(&self) -> u32 {
        self.total_bytes() / BYTES_PER_SAMPLE_FRAME
    }

    /// Regions in write order
    pub fn regions(&self) -> impl Iterator<Item = &AudioRegion> {
        std::iter::once(&self.first).chain(self.second.as_ref())
    }
}

impl RingBufferState {
    /// Create state for a ring of `capacity_bytes` kept `margin_frames` ahead of the play cursor
    pub fn new(
        capacity_bytes: u32,
        margin_frames: u32,
        samples_per_second: u32,
    ) -> Result<Self, ConfigError> {
        if margin_frames == 0 {
            return Err(ConfigError::ZeroMargin);
        }
        let margin_bytes = margin_frames as u64 * BYTES_PER_SAMPLE_FRAME as u64;
        if capacity_bytes == 0
            || capacity_bytes % BYTES_PER_SAMPLE_FRAME != 0
            || margin_bytes >= capacity_bytes as u64
        {
            return Err(ConfigError::MarginExceedsBuffer {
                margin_bytes,
                capacity_bytes: capacity_bytes as u64,
            });
        }
        Ok(Self {
            capacity_bytes,
            running_sample_index: 0,
            bytes_per_frame: BYTES_PER_SAMPLE_FRAME,
            margin_frames,
            samples_per_second,
        })
    }

    pub fn capacity_bytes(&self) -> u32 {
        self.capacity_bytes
    }

    pub fn running_sample_index(&self) -> u64 {
        self.running_sample_index
    }

    pub fn bytes_per_frame(&self) -> u32 {
        self.bytes_per_frame
    }

    pub fn margin_frames(&self) -> u32 {
        self.margin_frames
    }

    pub fn margin_bytes(&self) -> u32 {
        self.margin_frames * self.bytes_per_frame
    }

    pub fn samples_per_second(&self) -> u32 {
        self.samples_per_second
    }

    /// Physical byte position of the next frame to write
    pub fn byte_to_lock(&self) -> u32 {
        ((self.running_sample_index * self.bytes_per_frame as u64) % self.capacity_bytes as u64)
            as u32
    }

    /// End of the writable range: play cursor plus margin, wrapped
    pub fn target_cursor(&self, play_cursor: u32) -> u32 {
        ((play_cursor as u64 + self.margin_bytes() as u64) % self.capacity_bytes as u64) as u32
    }

    /// Bytes from `byte_to_lock` up to the target cursor, with wraparound
    pub fn write_length(&self, play_cursor: u32) -> u32 {
        let from = self.byte_to_lock();
        let target = self.target_cursor(play_cursor);
        if from > target {
            (self.capacity_bytes - from) + target
        } else {
            target - from
        }
    }

    /// How far the write position is ahead of the play cursor, in bytes
    pub fn lead(&self, play_cursor: u32) -> u32 {
        let from = self.byte_to_lock() as u64;
        let cap = self.capacity_bytes as u64;
        ((from + cap - play_cursor as u64 % cap) % cap) as u32
    }

    /// Whether the play cursor has reached or passed the write position
    ///
    /// A lead larger than the margin can only mean the reader went around us.
    pub fn is_underrun(&self, play_cursor: u32) -> bool {
        let lead = self.lead(play_cursor);
        lead == 0 || lead > self.margin_bytes()
    }

    /// Move the write position to one frame past the play cursor
    ///
    /// Returns the number of frames skipped. The running index only ever
    /// moves forward.
    pub fn reanchor(&mut self, play_cursor: u32) -> u64 {
        let cap = self.capacity_bytes as u64;
        let from = self.byte_to_lock() as u64;
        let wanted = (play_cursor as u64 % cap + self.bytes_per_frame as u64) % cap;
        let skipped_bytes = (wanted + cap - from) % cap;
        let skipped = skipped_bytes / self.bytes_per_frame as u64;
        self.running_sample_index += skipped;
        skipped
    }

    /// Split the range from the write position to the target cursor
    pub fn plan(&self, play_cursor: u32) -> WritePlan {
        let from = self.byte_to_lock();
        let length = self.write_length(play_cursor);
        let format = AudioFormat::stereo_i16(self.samples_per_second);

        let to_end = self.capacity_bytes - from;
        let (first, second) = if length <= to_end {
            (
                AudioRegion {
                    offset: from,
                    length,
                    format,
                },
                None,
            )
        } else {
            (
                AudioRegion {
                    offset: from,
                    length: to_end,
                    format,
                },
                Some(AudioRegion {
                    offset: 0,
                    length: length - to_end,
                    format,
                }),
            )
        };

        WritePlan {
            first,
            second,
            skipped_frames: 0,
            start_device: false,
        }
    }

    /// Account for `frames` stereo frames written
    pub fn advance(&mut self, frames: u64) {
        self.running_sample_index += frames;
    }

    /// Snap a device-reported cursor to a frame boundary inside the ring
    pub fn align_cursor(&self, play_cursor: u32) -> u32 {
        let wrapped = play_cursor % self.capacity_bytes;
        wrapped - wrapped % self.bytes_per_frame
    }
}
