//! Dispatch abstraction over the device that holds the particle fields.
//!
//! A backend owns nothing about frame sequencing: it allocates fields,
//! copies seed data into them and records passes with explicit input and
//! output bindings. [`crate::ParticleSimulation`] decides what runs when.
//! Passes recorded between two [`SimBackend::submit`] calls execute in
//! recording order.

use crate::error::SimError;
use crate::seed::Texel;
use crate::uniforms::{PositionUniforms, VelocityUniforms};

/// What the render stage needs besides the position field itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFeed {
    /// Field edge length; `edge²` points are drawn.
    pub edge: u32,
    /// Reference particle count over actual particle count.
    pub intensity_scale: f32,
    /// Lifetime normalizer for fading.
    pub max_life: f32,
}

impl RenderFeed {
    /// Number of points the render stage draws.
    pub fn particle_count(&self) -> u64 {
        self.edge as u64 * self.edge as u64
    }
}

/// A device that stores `edge × edge` RGBA32F fields and runs the
/// simulation passes over them.
pub trait SimBackend {
    /// Handle to one field (a float texture on the GPU, a texel vector on the CPU).
    type Field;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Largest field edge this backend can allocate.
    fn max_edge(&self) -> u32;

    /// Allocate one field. Contents are unspecified until written.
    fn allocate_field(&mut self, edge: u32, label: &str) -> Result<Self::Field, SimError>;

    /// Replace a field's contents with host data (row-major, `edge²` texels).
    fn upload_field(&mut self, field: &mut Self::Field, texels: &[Texel]) -> Result<(), SimError>;

    /// Record a full copy of `src` into `dst`.
    fn copy_field(&mut self, src: &Self::Field, dst: &mut Self::Field);

    /// Record the velocity pass: read `positions` and `velocities`, write `target`.
    fn run_velocity(
        &mut self,
        positions: &Self::Field,
        velocities: &Self::Field,
        target: &mut Self::Field,
        uniforms: &VelocityUniforms,
    );

    /// Record the position pass: read `positions` and the freshly written
    /// `velocities`, write `target`.
    fn run_position(
        &mut self,
        positions: &Self::Field,
        velocities: &Self::Field,
        target: &mut Self::Field,
        uniforms: &PositionUniforms,
    );

    /// Hand the latest position field to the render stage.
    fn feed_render(&mut self, positions: &Self::Field, feed: RenderFeed);

    /// Forget the render feed so nothing stale is drawn.
    fn clear_render(&mut self);

    /// Submit everything recorded so far. Does not wait for completion.
    fn submit(&mut self);

    /// Copy a field back to host memory. Blocks; diagnostics and tests only.
    fn read_field(&mut self, field: &Self::Field) -> Result<Vec<Texel>, SimError>;
}
