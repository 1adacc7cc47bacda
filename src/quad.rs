//! Full-screen quad used to drive every per-texel simulation pass.
//!
//! Two triangles covering clip space, each vertex carrying a UV in `[0, 1]`.
//! Rasterizing the quad into a field-sized target runs the fragment program
//! exactly once per particle.

use bytemuck::{Pod, Zeroable};

/// A quad vertex: clip-space position and texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// The quad as a triangle list (bottom-left, bottom-right, top-right, then
/// bottom-left, top-right, top-left).
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, -1.0, 0.0], uv: [1.0, 0.0] },
    QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 1.0] },
    QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 1.0] },
];

const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x2,
];

impl QuadVertex {
    /// Vertex buffer layout matching `@location(0) position, @location(1) uv`.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Quad vertex bytes, ready for a vertex buffer upload.
pub fn quad_bytes() -> &'static [u8] {
    bytemuck::cast_slice(&QUAD_VERTICES)
}
