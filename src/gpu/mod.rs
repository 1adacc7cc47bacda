//! wgpu implementation of [`SimBackend`].
//!
//! Fields are `Rgba32Float` textures. Passes are recorded into one pending
//! command encoder and handed to the queue on [`SimBackend::submit`]; the
//! host never waits for the device except in [`SimBackend::read_field`].

pub mod camera;
pub mod render;
pub mod stages;
pub mod texture;

use glam::Mat4;

use crate::backend::{RenderFeed, SimBackend};
use crate::error::SimError;
use crate::seed::Texel;
use crate::uniforms::{PositionUniforms, VelocityUniforms};

pub use camera::Camera;
pub use render::ParticleRenderer;
pub use stages::SimStages;
pub use texture::{FieldTexture, FIELD_FORMAT, FIELD_USAGES};

/// Format of the offscreen target used when rendering without a window.
pub const HEADLESS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Device and queue with the adapter they came from.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire a device with no surface attached.
    pub async fn headless() -> Result<Self, SimError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        Self::request(&instance, None).await
    }

    /// Acquire a device able to present to `surface`.
    pub async fn for_surface(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, SimError> {
        Self::request(instance, Some(surface)).await
    }

    async fn request(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, SimError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SimError::NoAdapter)?;
        let adapter_info = adapter.get_info();
        check_field_support(
            &adapter_info.name,
            adapter.get_texture_format_features(FIELD_FORMAT).allowed_usages,
        )?;

        // fields at the largest tier need the adapter's full texture size
        let limits = wgpu::Limits {
            max_texture_dimension_2d: adapter.limits().max_texture_dimension_2d,
            ..wgpu::Limits::downlevel_defaults()
        };
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Posefield Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| SimError::DeviceCreation(e.to_string()))?;

        log::info!(
            "using {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// Reject adapters that cannot both render into and sample [`FIELD_FORMAT`].
///
/// Software GL adapters commonly expose `Rgba32Float` for sampling and
/// storage only.
pub fn check_field_support(adapter: &str, allowed: wgpu::TextureUsages) -> Result<(), SimError> {
    if allowed.contains(FIELD_USAGES) {
        Ok(())
    } else {
        Err(SimError::UnsupportedAdapter {
            adapter: adapter.to_string(),
            format: FIELD_FORMAT,
            usages: allowed,
        })
    }
}

/// Simulation backend running both passes and the point renderer on a wgpu device.
pub struct GpuBackend {
    context: GpuContext,
    stages: SimStages,
    renderer: ParticleRenderer,
    encoder: Option<wgpu::CommandEncoder>,
}

impl GpuBackend {
    /// Build pipelines on `context`. Particles are rendered into targets of
    /// `target_format`. Pipelines the device rejects surface as
    /// [`SimError::Pipeline`].
    pub fn new(context: GpuContext, target_format: wgpu::TextureFormat) -> Result<Self, SimError> {
        let device = &context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let stages = SimStages::new(device);
        let renderer = ParticleRenderer::new(device, target_format);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(SimError::Pipeline {
                label: format!("pipelines for {target_format:?} targets"),
                reason: err.to_string(),
            });
        }

        Ok(Self {
            context,
            stages,
            renderer,
            encoder: None,
        })
    }

    /// Headless device rendering into [`HEADLESS_FORMAT`] targets.
    pub fn headless() -> Result<Self, SimError> {
        let context = pollster::block_on(GpuContext::headless())?;
        Self::new(context, HEADLESS_FORMAT)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    /// What the renderer will draw next, if anything.
    pub fn render_feed(&self) -> Option<RenderFeed> {
        self.renderer.current_feed()
    }

    /// Draw the latest fed field into `target` and submit.
    /// Returns `false` if nothing has been fed yet.
    pub fn render(&mut self, target: &wgpu::TextureView, view_proj: Mat4) -> bool {
        let encoder = pending_encoder(&self.context.device, &mut self.encoder);
        let drawn = self
            .renderer
            .draw(&self.context.queue, encoder, target, view_proj);
        self.submit();
        drawn
    }
}

/// The encoder collecting this submission's commands, created on first use.
fn pending_encoder<'a>(
    device: &wgpu::Device,
    slot: &'a mut Option<wgpu::CommandEncoder>,
) -> &'a mut wgpu::CommandEncoder {
    slot.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Simulation Encoder"),
        })
    })
}

impl SimBackend for GpuBackend {
    type Field = FieldTexture;

    fn name(&self) -> &'static str {
        "gpu"
    }

    fn max_edge(&self) -> u32 {
        self.context.device.limits().max_texture_dimension_2d
    }

    fn allocate_field(&mut self, edge: u32, label: &str) -> Result<FieldTexture, SimError> {
        FieldTexture::new(&self.context.device, edge, label)
    }

    fn upload_field(&mut self, field: &mut FieldTexture, texels: &[Texel]) -> Result<(), SimError> {
        field.upload(&self.context.queue, texels)
    }

    fn copy_field(&mut self, src: &FieldTexture, dst: &mut FieldTexture) {
        let encoder = pending_encoder(&self.context.device, &mut self.encoder);
        src.copy_to(encoder, dst);
    }

    fn run_velocity(
        &mut self,
        positions: &FieldTexture,
        velocities: &FieldTexture,
        target: &mut FieldTexture,
        uniforms: &VelocityUniforms,
    ) {
        let encoder = pending_encoder(&self.context.device, &mut self.encoder);
        self.stages.velocity.record(
            &self.context.device,
            &self.context.queue,
            encoder,
            &self.stages.quad,
            bytemuck::bytes_of(uniforms),
            positions,
            velocities,
            target,
        );
    }

    fn run_position(
        &mut self,
        positions: &FieldTexture,
        velocities: &FieldTexture,
        target: &mut FieldTexture,
        uniforms: &PositionUniforms,
    ) {
        let encoder = pending_encoder(&self.context.device, &mut self.encoder);
        self.stages.position.record(
            &self.context.device,
            &self.context.queue,
            encoder,
            &self.stages.quad,
            bytemuck::bytes_of(uniforms),
            positions,
            velocities,
            target,
        );
    }

    fn feed_render(&mut self, positions: &FieldTexture, feed: RenderFeed) {
        self.renderer.feed(&self.context.device, positions, feed);
    }

    fn clear_render(&mut self) {
        self.renderer.clear();
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn read_field(&mut self, field: &FieldTexture) -> Result<Vec<Texel>, SimError> {
        self.submit();
        field.read(&self.context.device, &self.context.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_only_adapter_is_rejected() {
        // what a software GL adapter reports for Rgba32Float
        let usages = wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING;
        let err = check_field_support("llvmpipe", usages).unwrap_err();
        assert!(matches!(
            err,
            SimError::UnsupportedAdapter { format, .. } if format == FIELD_FORMAT
        ));
        assert!(err.to_string().contains("llvmpipe"));
    }

    #[test]
    fn test_renderable_adapter_is_accepted() {
        let usages = FIELD_USAGES | wgpu::TextureUsages::STORAGE_BINDING;
        assert!(check_field_support("discrete", usages).is_ok());
    }
}
