//! Host-memory reference backend.
//!
//! Runs the [`kernels`](crate::kernels) per texel over plain vectors. It is
//! slow, deterministic and needs no device, which makes it the backend for
//! tests, benches and GPU-less machines. Every recorded pass is also noted
//! in a journal so callers can check ordering.

use glam::Vec4;

use crate::backend::{RenderFeed, SimBackend};
use crate::error::SimError;
use crate::kernels;
use crate::seed::Texel;
use crate::uniforms::{PositionUniforms, VelocityUniforms};

/// Default edge limit; keeps an accidental large tier from eating host memory.
const DEFAULT_MAX_EDGE: u32 = 1024;

/// One field stored as row-major texels.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuField {
    edge: u32,
    texels: Vec<Texel>,
}

impl CpuField {
    pub fn edge(&self) -> u32 {
        self.edge
    }

    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }
}

/// A pass as recorded by [`CpuBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Copy,
    Velocity,
    Position,
    Feed,
    Submit,
}

/// Snapshot taken when the render stage is fed.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub positions: Vec<Texel>,
    pub feed: RenderFeed,
}

/// Reference backend running the kernels on the host.
#[derive(Debug)]
pub struct CpuBackend {
    max_edge: u32,
    journal: Vec<Pass>,
    render: Option<RenderFrame>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::with_max_edge(DEFAULT_MAX_EDGE)
    }

    /// Backend that refuses fields larger than `max_edge`.
    pub fn with_max_edge(max_edge: u32) -> Self {
        Self {
            max_edge,
            journal: Vec::new(),
            render: None,
        }
    }

    /// Drain the pass journal.
    pub fn take_journal(&mut self) -> Vec<Pass> {
        std::mem::take(&mut self.journal)
    }

    /// Last frame handed to the render stage.
    pub fn render_frame(&self) -> Option<&RenderFrame> {
        self.render.as_ref()
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBackend for CpuBackend {
    type Field = CpuField;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn max_edge(&self) -> u32 {
        self.max_edge
    }

    fn allocate_field(&mut self, edge: u32, label: &str) -> Result<CpuField, SimError> {
        if edge == 0 || edge > self.max_edge {
            return Err(SimError::Allocation {
                edge,
                reason: format!("{label}: edge exceeds host limit {}", self.max_edge),
            });
        }
        let count = edge as usize * edge as usize;
        Ok(CpuField {
            edge,
            texels: vec![[0.0; 4]; count],
        })
    }

    fn upload_field(&mut self, field: &mut CpuField, texels: &[Texel]) -> Result<(), SimError> {
        if texels.len() != field.texels.len() {
            return Err(SimError::FieldSize {
                expected: field.texels.len(),
                actual: texels.len(),
            });
        }
        field.texels.copy_from_slice(texels);
        Ok(())
    }

    fn copy_field(&mut self, src: &CpuField, dst: &mut CpuField) {
        dst.edge = src.edge;
        dst.texels.clone_from(&src.texels);
        self.journal.push(Pass::Copy);
    }

    fn run_velocity(
        &mut self,
        positions: &CpuField,
        velocities: &CpuField,
        target: &mut CpuField,
        uniforms: &VelocityUniforms,
    ) {
        for ((out, pos), vel) in target
            .texels
            .iter_mut()
            .zip(&positions.texels)
            .zip(&velocities.texels)
        {
            *out = kernels::velocity_texel(Vec4::from_array(*pos), Vec4::from_array(*vel), uniforms)
                .to_array();
        }
        self.journal.push(Pass::Velocity);
    }

    fn run_position(
        &mut self,
        positions: &CpuField,
        velocities: &CpuField,
        target: &mut CpuField,
        uniforms: &PositionUniforms,
    ) {
        for (index, ((out, pos), vel)) in target
            .texels
            .iter_mut()
            .zip(&positions.texels)
            .zip(&velocities.texels)
            .enumerate()
        {
            *out = kernels::position_texel(
                Vec4::from_array(*pos),
                Vec4::from_array(*vel),
                index as u32,
                uniforms,
            )
            .to_array();
        }
        self.journal.push(Pass::Position);
    }

    fn feed_render(&mut self, positions: &CpuField, feed: RenderFeed) {
        self.render = Some(RenderFrame {
            positions: positions.texels.clone(),
            feed,
        });
        self.journal.push(Pass::Feed);
    }

    fn clear_render(&mut self) {
        self.render = None;
    }

    fn submit(&mut self) {
        self.journal.push(Pass::Submit);
    }

    fn read_field(&mut self, field: &CpuField) -> Result<Vec<Texel>, SimError> {
        Ok(field.texels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimParams;
    use glam::Vec3;

    #[test]
    fn test_allocation_limit() {
        let mut backend = CpuBackend::with_max_edge(16);
        assert!(backend.allocate_field(16, "ok").is_ok());
        let err = backend.allocate_field(32, "too big").unwrap_err();
        assert!(err.is_allocation());
        assert!(backend.allocate_field(0, "empty").is_err());
    }

    #[test]
    fn test_upload_size_mismatch() {
        let mut backend = CpuBackend::new();
        let mut field = backend.allocate_field(2, "f").unwrap();
        let err = backend.upload_field(&mut field, &[[0.0; 4]; 3]).unwrap_err();
        assert!(matches!(err, SimError::FieldSize { expected: 4, actual: 3 }));
        backend.upload_field(&mut field, &[[1.0; 4]; 4]).unwrap();
        assert_eq!(field.texels(), &[[1.0; 4]; 4]);
    }

    #[test]
    fn test_velocity_pass_matches_kernel() {
        let mut backend = CpuBackend::new();
        let mut pos = backend.allocate_field(2, "pos").unwrap();
        let mut vel = backend.allocate_field(2, "vel").unwrap();
        let mut out = backend.allocate_field(2, "out").unwrap();
        backend
            .upload_field(&mut pos, &[[0.1, 0.2, 0.3, 5.0], [1.0, 0.0, 0.0, 5.0], [0.0; 4], [3.0, 0.0, 0.0, 1.0]])
            .unwrap();
        backend.upload_field(&mut vel, &[[0.5, 0.0, 0.0, 1.0]; 4]).unwrap();

        let params = SimParams {
            boundary_radius: 2.0,
            ..Default::default()
        };
        let u = VelocityUniforms::new(&params, Vec3::new(0.0, 30.0, 0.0), 0.5, 0.016);
        backend.run_velocity(&pos, &vel, &mut out, &u);

        for i in 0..4 {
            let expected = kernels::velocity_texel(
                Vec4::from_array(pos.texels()[i]),
                Vec4::from_array(vel.texels()[i]),
                &u,
            );
            assert_eq!(out.texels()[i], expected.to_array());
        }
        assert_eq!(backend.take_journal(), vec![Pass::Velocity]);
    }

    #[test]
    fn test_feed_snapshot_and_clear() {
        let mut backend = CpuBackend::new();
        let mut pos = backend.allocate_field(1, "pos").unwrap();
        backend.upload_field(&mut pos, &[[1.0, 2.0, 3.0, 4.0]]).unwrap();
        let feed = RenderFeed {
            edge: 1,
            intensity_scale: 2.0,
            max_life: 10.0,
        };
        backend.feed_render(&pos, feed);
        let frame = backend.render_frame().unwrap();
        assert_eq!(frame.positions, vec![[1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(frame.feed.particle_count(), 1);

        backend.clear_render();
        assert!(backend.render_frame().is_none());
    }
}
