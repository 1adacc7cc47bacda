//! External input signals: the pose label and the audio level.
//!
//! Both are written by collaborators on their own cadence (classifier at
//! roughly 24 Hz, audio analyzer per audio callback) and read once per
//! simulation frame. They are analog-like signals, so there is no locking
//! and no delivery guarantee: the last written value wins.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use glam::Vec3;

/// Discrete pose labels produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PoseLabel {
    #[default]
    Neutral = 0,
    Left = 1,
    Right = 2,
    Up = 3,
    Wide = 4,
}

impl PoseLabel {
    pub const ALL: [PoseLabel; 5] = [
        PoseLabel::Neutral,
        PoseLabel::Left,
        PoseLabel::Right,
        PoseLabel::Up,
        PoseLabel::Wide,
    ];

    /// Canonical label string.
    pub fn as_str(self) -> &'static str {
        match self {
            PoseLabel::Neutral => "neutral",
            PoseLabel::Left => "left",
            PoseLabel::Right => "right",
            PoseLabel::Up => "up",
            PoseLabel::Wide => "wide",
        }
    }

    /// Parse a classifier label. Anything outside the enumeration is `Neutral`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => PoseLabel::Left,
            "right" => PoseLabel::Right,
            "up" => PoseLabel::Up,
            "wide" => PoseLabel::Wide,
            _ => PoseLabel::Neutral,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => PoseLabel::Left,
            2 => PoseLabel::Right,
            3 => PoseLabel::Up,
            4 => PoseLabel::Wide,
            _ => PoseLabel::Neutral,
        }
    }

    /// External force for this pose.
    ///
    /// Axis convention: x is the explosion axis, y the vertical axis and
    /// z the rotation axis.
    pub fn force(self, strength: f32) -> Vec3 {
        match self {
            PoseLabel::Up => Vec3::new(0.0, strength, 0.0),
            PoseLabel::Wide => Vec3::new(strength * 3.0, 0.0, 0.0),
            PoseLabel::Right => Vec3::new(0.0, 0.0, strength / 2.0),
            PoseLabel::Left => Vec3::new(0.0, 0.0, -strength / 2.0),
            PoseLabel::Neutral => Vec3::ZERO,
        }
    }
}

impl fmt::Display for PoseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoseLabel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PoseLabel::from_label(s))
    }
}

/// Shared, continuously updated pose label.
///
/// Cloning yields another handle to the same cell.
#[derive(Debug, Clone, Default)]
pub struct LabelRef(Arc<AtomicU8>);

impl LabelRef {
    pub fn new(label: PoseLabel) -> Self {
        Self(Arc::new(AtomicU8::new(label as u8)))
    }

    /// Publish a new label.
    pub fn set(&self, label: PoseLabel) {
        self.0.store(label as u8, Ordering::Relaxed);
    }

    /// Publish a raw classifier string; unknown labels become `Neutral`.
    pub fn set_str(&self, label: &str) {
        self.set(PoseLabel::from_label(label));
    }

    /// Most recently published label.
    pub fn get(&self) -> PoseLabel {
        PoseLabel::from_u8(self.0.load(Ordering::Relaxed))
    }
}

/// Shared, continuously updated audio level in `[0, 1]`.
///
/// Stored as raw `f32` bits in an atomic cell.
#[derive(Debug, Clone, Default)]
pub struct LevelRef(Arc<AtomicU32>);

impl LevelRef {
    /// Exponential smoothing weight kept from the previous level.
    const DECAY: f32 = 0.8;
    /// Gain applied to the raw RMS before clamping.
    const RMS_GAIN: f32 = 100.0;

    pub fn new(level: f32) -> Self {
        let cell = Self::default();
        cell.set(level);
        cell
    }

    /// Publish a level. Stored as given; clamping happens on read.
    pub fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Raw stored value, possibly outside `[0, 1]`.
    pub fn raw(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Most recent level clamped into `[0, 1]`; NaN reads as silence.
    pub fn get(&self) -> f32 {
        let v = self.raw();
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, 1.0)
        }
    }

    /// Fold a block of time-domain samples into the smoothed level.
    ///
    /// Computes the block RMS, scales and clamps it into `[0, 1]`, then
    /// blends it with the previous level (`0.8 * old + 0.2 * new`).
    /// Returns the new level.
    pub fn feed_samples(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return self.get();
        }
        let sum: f32 = samples.iter().map(|s| s * s).sum();
        let rms = ((sum / samples.len() as f32).sqrt() * Self::RMS_GAIN).clamp(0.0, 1.0);
        let level = self.get() * Self::DECAY + rms * (1.0 - Self::DECAY);
        self.set(level);
        level
    }
}
