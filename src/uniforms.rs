//! Uniform blocks shared by the GPU passes and the CPU reference backend.
//!
//! Layouts mirror the WGSL structs in `src/*.wgsl` byte for byte
//! (`vec3` is 16-byte aligned, so the trailing scalar packs into its tail).

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::config::SimParams;
use crate::kernels;

/// Parameters of the velocity pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VelocityUniforms {
    pub force: [f32; 3],
    pub delta_time: f32,
    pub damping: f32,
    pub boundary_radius: f32,
    /// Curl strength already modulated by the audio level.
    pub curl_scale: f32,
    pub _padding: f32,
}

impl VelocityUniforms {
    /// Build the block for one frame from a sanitized parameter snapshot.
    pub fn new(params: &SimParams, force: Vec3, audio_level: f32, delta_time: f32) -> Self {
        Self {
            force: force.to_array(),
            delta_time,
            damping: params.damping,
            boundary_radius: params.boundary_radius,
            curl_scale: kernels::curl_scale(params.curl_strength, audio_level, params.audio_flag()),
            _padding: 0.0,
        }
    }

    #[inline]
    pub fn force(&self) -> Vec3 {
        Vec3::from_array(self.force)
    }
}

/// Parameters of the position pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PositionUniforms {
    pub delta_time: f32,
    /// Elapsed simulation time; salts the respawn hash.
    pub time: f32,
    pub max_life: f32,
    /// Radius of the ball respawned particles are drawn from.
    pub spawn_radius: f32,
}

impl PositionUniforms {
    pub fn new(params: &SimParams, spawn_radius: f32, delta_time: f32, time: f32) -> Self {
        Self {
            delta_time,
            time,
            max_life: params.max_life,
            spawn_radius: spawn_radius.min(params.boundary_radius),
        }
    }
}

/// Parameters of the particle render pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RenderUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Field edge length; the vertex index maps to texel `(i % edge, i / edge)`.
    pub edge: u32,
    pub intensity_scale: f32,
    pub max_life: f32,
    pub _padding: f32,
}

impl RenderUniforms {
    pub fn new(view_proj: Mat4, edge: u32, intensity_scale: f32, max_life: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            edge,
            intensity_scale,
            max_life,
            _padding: 0.0,
        }
    }
}
