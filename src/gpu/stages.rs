//! Velocity and position passes.
//!
//! Each pass draws the full-screen quad into an edge-sized field texture
//! with a fragment program that reads its inputs with `textureLoad`. Bind
//! groups are built per dispatch because the read and write textures trade
//! places every frame.

use wgpu::util::DeviceExt;

use super::texture::{FieldTexture, FIELD_FORMAT};
use crate::quad::{quad_bytes, QuadVertex, QUAD_VERTICES};
use crate::shader::{POSITION_SOURCE, VELOCITY_SOURCE};

/// One fragment pass over the quad: pipeline, layout and its uniform buffer.
pub struct FieldPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl FieldPass {
    /// Build a pass from WGSL exposing `vs_main`/`fs_main` and bindings
    /// `0: uniform`, `1: positions`, `2: velocities`.
    pub fn new(device: &wgpu::Device, label: &'static str, source: &str, uniform_size: u64) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let field_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                field_entry(1),
                field_entry(2),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FIELD_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            label,
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    /// Record one dispatch: `target = program(positions, velocities)`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        quad: &wgpu::Buffer,
        uniforms: &[u8],
        positions: &FieldTexture,
        velocities: &FieldTexture,
        target: &FieldTexture,
    ) {
        queue.write_buffer(&self.uniform_buffer, 0, uniforms);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&positions.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&velocities.view),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    // every texel is overwritten
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, quad.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

/// The quad vertex buffer plus both simulation passes.
pub struct SimStages {
    pub quad: wgpu::Buffer,
    pub velocity: FieldPass,
    pub position: FieldPass,
}

impl SimStages {
    pub fn new(device: &wgpu::Device) -> Self {
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: quad_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            quad,
            velocity: FieldPass::new(
                device,
                "Velocity Pass",
                VELOCITY_SOURCE,
                std::mem::size_of::<crate::uniforms::VelocityUniforms>() as u64,
            ),
            position: FieldPass::new(
                device,
                "Position Pass",
                POSITION_SOURCE,
                std::mem::size_of::<crate::uniforms::PositionUniforms>() as u64,
            ),
        }
    }
}
