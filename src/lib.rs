//! # posefield
//!
//! GPU particle field steered by a body-pose label and an audio level.
//!
//! Roughly a million particles live in floating-point textures, one texel
//! per particle. Every frame a velocity pass and a position pass run over
//! the whole field as fragment programs, ping-ponging between two textures
//! per field, and a point renderer draws the result with additive blending.
//!
//! ## Quick Start
//!
//! ```ignore
//! use posefield::prelude::*;
//!
//! let backend = GpuBackend::headless()?;
//! let label = LabelRef::default();
//! let mut sim = ParticleSimulation::new(backend)
//!     .with_quality(Quality::Small)
//!     .with_label(label.clone());
//! sim.initialize()?;
//!
//! let mut clock = FrameClock::new();
//! loop {
//!     label.set(PoseLabel::Up);
//!     let (elapsed, delta) = clock.tick();
//!     sim.step(FrameInput::new(delta, elapsed))?;
//! }
//! ```
//!
//! ## Inputs
//!
//! | Input | Type | Effect |
//! |-------|------|--------|
//! | pose label | [`LabelRef`] | external force: `up`, `wide`, `left`, `right`, `neutral` |
//! | audio level | [`LevelRef`] | scales curl-noise turbulence |
//! | parameters | [`SimParams`] | lifetime, damping, boundary, curl strength |
//! | quality | [`Quality`] | field edge 512 / 1024 / 2048, debounced |
//!
//! ## Backends
//!
//! [`GpuBackend`] runs the passes on wgpu. [`CpuBackend`] runs the same
//! per-texel [`kernels`] on the host and is what the tests drive.

pub mod backend;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod kernels;
pub mod pingpong;
pub mod quad;
pub mod seed;
pub mod shader;
pub mod signal;
pub mod simulation;
pub mod time;
pub mod uniforms;
pub mod watchdog;

pub use backend::{RenderFeed, SimBackend};
pub use config::{Quality, SeedConfig, Settings, SimParams};
pub use cpu::{CpuBackend, CpuField};
pub use error::SimError;
pub use glam::{Mat4, Vec3, Vec4};
pub use gpu::{Camera, GpuBackend, GpuContext};
pub use pingpong::PingPong;
pub use seed::{SeedData, Texel};
pub use signal::{LabelRef, LevelRef, PoseLabel};
pub use simulation::{
    FrameInput, ParticleSimulation, ResetReason, SimState, StepOutcome, StepReport,
};
pub use time::FrameClock;
pub use watchdog::FrameWatchdog;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use posefield::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::SimBackend;
    pub use crate::config::{Quality, SeedConfig, Settings, SimParams};
    pub use crate::cpu::CpuBackend;
    pub use crate::error::SimError;
    pub use crate::gpu::{Camera, GpuBackend};
    pub use crate::signal::{LabelRef, LevelRef, PoseLabel};
    pub use crate::simulation::{FrameInput, ParticleSimulation, SimState, StepOutcome};
    pub use crate::time::FrameClock;
    pub use crate::{Vec3, Vec4};
}
