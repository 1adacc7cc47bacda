//! Simulation parameters, quality tiers and the settings file.
//!
//! [`SimParams`] is the live control record: the owner may change it
//! between frames, and every step takes a sanitized snapshot of it.
//! [`Settings`] is the on-disk TOML form used by the runner.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::SimError;

/// Live simulation parameters, re-read every frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Maximum particle lifetime in seconds.
    pub max_life: f32,
    /// Per-step velocity multiplier in `(0, 1]`.
    pub damping: f32,
    /// Radius of the containment sphere.
    pub boundary_radius: f32,
    /// Curl-noise turbulence strength before audio modulation.
    pub curl_strength: f32,
    /// Whether the audio level modulates turbulence.
    pub audio_enabled: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_life: 10.0,
            damping: 0.99,
            boundary_radius: 100.0,
            curl_strength: 1.0,
            audio_enabled: true,
        }
    }
}

impl SimParams {
    const MIN_MAX_LIFE: f32 = 1e-3;
    const MIN_DAMPING: f32 = 1e-3;
    const MIN_BOUNDARY: f32 = 1e-3;

    /// Clamp every field into its legal domain. NaN falls back to the default.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let pick = |v: f32, d: f32| if v.is_nan() { d } else { v };
        Self {
            max_life: pick(self.max_life, defaults.max_life).max(Self::MIN_MAX_LIFE),
            damping: pick(self.damping, defaults.damping).clamp(Self::MIN_DAMPING, 1.0),
            boundary_radius: pick(self.boundary_radius, defaults.boundary_radius)
                .max(Self::MIN_BOUNDARY),
            curl_strength: pick(self.curl_strength, defaults.curl_strength).max(0.0),
            audio_enabled: self.audio_enabled,
        }
    }

    /// The audio enable flag as the `0 | 1` multiplier used by the velocity stage.
    #[inline]
    pub fn audio_flag(&self) -> f32 {
        if self.audio_enabled {
            1.0
        } else {
            0.0
        }
    }
}

/// Discrete simulation size. Total particle count is `edge²`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// 512 × 512 ≈ 262K particles.
    Small,
    /// 1024 × 1024 ≈ 1.05M particles.
    #[default]
    Medium,
    /// 2048 × 2048 ≈ 4.19M particles.
    Large,
    /// Arbitrary edge length, mainly for tests and diagnostics.
    #[serde(skip)]
    Custom(u32),
}

impl Quality {
    /// Tier whose particle count normalizes render intensity.
    pub const REFERENCE: Quality = Quality::Medium;

    /// Texture edge length for this tier.
    pub fn edge(self) -> u32 {
        match self {
            Quality::Small => 512,
            Quality::Medium => 1024,
            Quality::Large => 2048,
            Quality::Custom(edge) => edge,
        }
    }

    /// Number of particles simulated at this tier.
    pub fn particle_count(self) -> u64 {
        let edge = self.edge() as u64;
        edge * edge
    }

    /// Brightness scale keeping perceived density roughly constant across tiers.
    pub fn intensity_scale(self) -> f32 {
        let actual = self.particle_count().max(1);
        (Self::REFERENCE.particle_count() as f64 / actual as f64) as f32
    }

    /// Parse a tier name as accepted on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "small" => Some(Quality::Small),
            "medium" => Some(Quality::Medium),
            "large" => Some(Quality::Large),
            other => other.parse::<u32>().ok().filter(|e| *e > 0).map(Quality::Custom),
        }
    }
}

/// Shape of the seed distribution.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Radius of the ball initial positions are drawn from.
    pub radius: f32,
    /// Half-width of the uniform initial velocity distribution.
    pub velocity_scale: f32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            radius: 2.0,
            velocity_scale: 0.1,
        }
    }
}

/// Runner settings, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub quality: Quality,
    pub force_strength: f32,
    pub quality_debounce_ms: u64,
    pub seed: Option<u64>,
    pub params: SimParams,
    pub seed_state: SeedConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            force_strength: 30.0,
            quality_debounce_ms: 500,
            seed: None,
            params: SimParams::default(),
            seed_state: SeedConfig::default(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, SimError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml(&text)?;
        log::debug!("loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Quality change debounce as a duration.
    pub fn quality_debounce(&self) -> Duration {
        Duration::from_millis(self.quality_debounce_ms)
    }
}
