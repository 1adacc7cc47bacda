//! Frame-rate watchdog.
//!
//! Keeps the last [`FrameWatchdog::WINDOW`] frame deltas in a ring buffer and
//! reports a collapse when their average implies fewer than `min_fps` frames
//! per second. A collapse means each step integrates a long, lossy delta, so
//! the simulation reseeds instead of accumulating error.

/// Rolling average of recent frame deltas.
#[derive(Debug, Clone)]
pub struct FrameWatchdog {
    samples: [f32; Self::WINDOW],
    /// Next slot to overwrite.
    head: usize,
    len: usize,
    min_fps: f32,
}

impl FrameWatchdog {
    /// Number of deltas averaged.
    pub const WINDOW: usize = 30;
    /// Default threshold below which the simulation is considered collapsed.
    pub const DEFAULT_MIN_FPS: f32 = 4.0;

    pub fn new(min_fps: f32) -> Self {
        Self {
            samples: [0.0; Self::WINDOW],
            head: 0,
            len: 0,
            min_fps,
        }
    }

    /// Record a frame delta (seconds). Negative or NaN deltas count as zero.
    pub fn record(&mut self, delta: f32) {
        let delta = if delta.is_nan() { 0.0 } else { delta.max(0.0) };
        if self.len < Self::WINDOW {
            self.len += 1;
        }
        self.samples[self.head] = delta;
        self.head = (self.head + 1) % Self::WINDOW;
    }

    /// Average of the recorded window, or `None` before the first sample.
    pub fn average(&self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        let sum: f32 = self.samples[..self.len].iter().sum();
        Some(sum / self.len as f32)
    }

    /// Whether the average frame time is worse than `min_fps`.
    pub fn is_collapsed(&self) -> bool {
        match self.average() {
            Some(avg) => avg > 1.0 / self.min_fps,
            None => false,
        }
    }

    /// Record a delta and report whether the window is now collapsed.
    pub fn observe(&mut self, delta: f32) -> bool {
        self.record(delta);
        self.is_collapsed()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn min_fps(&self) -> f32 {
        self.min_fps
    }

    /// Forget all samples.
    pub fn clear(&mut self) {
        *self = Self::new(self.min_fps);
    }
}

impl Default for FrameWatchdog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_FPS)
    }
}
