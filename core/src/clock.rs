//! Fixed-rate frame pacing

use std::time::{Duration, Instant};

/// Paces frames at a fixed update rate
///
/// Deadlines advance by exactly one frame time so small jitter averages out.
/// A frame that overruns its budget is logged and the schedule restarts from
/// now rather than trying to catch up.
#[derive(Debug, Clone)]
pub struct FrameClock {
    target: Duration,
    frame_start: Instant,
    next_deadline: Instant,
    frames: u64,
    overruns: u64,
}

impl FrameClock {
    pub fn new(update_hz: u32) -> Self {
        let target = Duration::from_secs(1) / update_hz.max(1);
        let now = Instant::now();
        Self {
            target,
            frame_start: now,
            next_deadline: now,
            frames: 0,
            overruns: 0,
        }
    }

    /// Budget for one frame
    pub fn target_frame_time(&self) -> Duration {
        self.target
    }

    /// When the next frame should start
    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_deadline
    }

    /// Frames completed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames that exceeded their budget
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn start_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Close the frame and schedule the next one; returns the time spent
    pub fn finish_frame(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.frame_start);
        self.frames += 1;

        if elapsed > self.target {
            self.overruns += 1;
            tracing::warn!(
                "Frame {} took {:?}, exceeds budget of {:?}",
                self.frames,
                elapsed,
                self.target
            );
        }

        self.next_deadline += self.target;
        if self.next_deadline < now {
            self.next_deadline = now;
        }
        elapsed
    }
}
