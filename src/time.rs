//! Frame clock for driving the simulation from a render loop.
//!
//! The first tick reports a zero delta; later ticks report wall time since
//! the previous tick, or a fixed step when one is configured (headless runs).
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//! loop {
//!     let (elapsed, delta) = clock.tick();
//!     sim.step(FrameInput::new(delta, elapsed))?;
//! }
//! ```

use std::time::{Duration, Instant};

/// Elapsed/delta bookkeeping for a render loop.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Option<Instant>,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    fixed_delta: Option<f32>,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: None,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            fixed_delta: None,
        }
    }

    /// Clock that advances by exactly `delta` seconds per tick.
    pub fn fixed(delta: f32) -> Self {
        let mut clock = Self::new();
        clock.fixed_delta = Some(delta.max(0.0));
        clock
    }

    /// Advance one frame. Returns `(elapsed, delta)` in seconds.
    pub fn tick(&mut self) -> (f32, f32) {
        let now = Instant::now();

        self.delta_secs = match (self.last_tick, self.fixed_delta) {
            (None, _) => 0.0,
            (Some(_), Some(fixed)) => fixed,
            (Some(last), None) => now.duration_since(last).as_secs_f32(),
        };
        self.last_tick = Some(now);

        self.elapsed_secs = match self.fixed_delta {
            Some(_) => self.elapsed_secs + self.delta_secs,
            None => now.duration_since(self.start).as_secs_f32(),
        };
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        (self.elapsed_secs, self.delta_secs)
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Ticks since creation.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, refreshed twice a second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
