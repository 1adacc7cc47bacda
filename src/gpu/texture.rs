//! Float field textures.
//!
//! One field is an `edge × edge` `Rgba32Float` texture, one texel per
//! particle, no mipmaps. It is a render target for the pass that writes it
//! and a `textureLoad` source for every pass that reads it, so it never
//! needs a sampler.

use crate::error::SimError;
use crate::seed::Texel;

/// Texel format of every field.
pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Bytes per texel of [`FIELD_FORMAT`].
pub const TEXEL_BYTES: u32 = 16;
/// Usages every field texture is created with.
pub const FIELD_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// A field texture and its default view.
#[derive(Debug)]
pub struct FieldTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub edge: u32,
}

impl FieldTexture {
    /// Allocate a field, turning device validation and out-of-memory errors
    /// into [`SimError::Allocation`].
    pub fn new(device: &wgpu::Device, edge: u32, label: &str) -> Result<Self, SimError> {
        let limit = device.limits().max_texture_dimension_2d;
        if edge == 0 || edge > limit {
            return Err(SimError::Allocation {
                edge,
                reason: format!("{label}: device texture limit is {limit}"),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(edge),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FIELD_FORMAT,
            usage: FIELD_USAGES,
            view_formats: &[],
        });
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(SimError::Allocation {
                edge,
                reason: format!("{label}: {err}"),
            });
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            edge,
        })
    }

    /// Number of texels.
    pub fn len(&self) -> usize {
        self.edge as usize * self.edge as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue a full overwrite with host texels. Applied before the next submission.
    pub fn upload(&self, queue: &wgpu::Queue, texels: &[Texel]) -> Result<(), SimError> {
        if texels.len() != self.len() {
            return Err(SimError::FieldSize {
                expected: self.len(),
                actual: texels.len(),
            });
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.edge * TEXEL_BYTES),
                rows_per_image: Some(self.edge),
            },
            extent(self.edge),
        );
        Ok(())
    }

    /// Record a texture-to-texture copy of the whole field.
    pub fn copy_to(&self, encoder: &mut wgpu::CommandEncoder, dst: &FieldTexture) {
        encoder.copy_texture_to_texture(
            self.texture.as_image_copy(),
            dst.texture.as_image_copy(),
            extent(self.edge.min(dst.edge)),
        );
    }

    /// Copy the field back to host memory, blocking until the device is idle.
    pub fn read(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<Texel>, SimError> {
        let unpadded_bytes_per_row = self.edge * TEXEL_BYTES;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Readback Buffer"),
            size: padded_bytes_per_row as u64 * self.edge as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Field Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            self.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.edge),
                },
            },
            extent(self.edge),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| SimError::Readback(e.to_string()))?
            .map_err(|e| SimError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity(self.len());
        for row in 0..self.edge {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            texels.extend(
                data[start..end]
                    .chunks_exact(TEXEL_BYTES as usize)
                    .map(bytemuck::pod_read_unaligned::<Texel>),
            );
        }
        drop(data);
        staging.unmap();

        Ok(texels)
    }
}

fn extent(edge: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: edge,
        height: edge,
        depth_or_array_layers: 1,
    }
}
