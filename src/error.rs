//! Error types for posefield.
//!
//! Only GPU bring-up, field allocation and settings loading surface as
//! errors. Frame-time collapse and out-of-range input signals are handled
//! inside the simulation (reset or clamp) and only logged.

use thiserror::Error;

/// Errors produced by the simulation core and its backends.
#[derive(Debug, Error)]
pub enum SimError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a Vulkan/Metal/DX12/WebGPU capable device is required")]
    NoAdapter,

    /// Failed to create the GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(String),

    /// The adapter cannot render into or sample the field format.
    #[error("adapter '{adapter}' cannot use {format:?} particle fields (supports {usages:?})")]
    UnsupportedAdapter {
        adapter: String,
        format: wgpu::TextureFormat,
        usages: wgpu::TextureUsages,
    },

    /// A render pipeline was rejected by the device.
    #[error("failed to build {label}: {reason}")]
    Pipeline { label: String, reason: String },

    /// Failed to create or configure a presentation surface.
    #[error("surface error: {0}")]
    Surface(String),

    /// A field texture could not be allocated at the requested edge length.
    ///
    /// Fatal to that quality tier; the caller should pick a smaller one.
    #[error("failed to allocate {edge}x{edge} particle field: {reason}")]
    Allocation { edge: u32, reason: String },

    /// Seed data does not match the field it is uploaded into.
    #[error("field size mismatch: expected {expected} texels, got {actual}")]
    FieldSize { expected: usize, actual: usize },

    /// Mapping a readback buffer failed.
    #[error("failed to read field back from the GPU: {0}")]
    Readback(String),

    /// The simulation has no live buffers (not initialized, or disposed).
    #[error("simulation is not running")]
    NotRunning,

    /// Settings file could not be parsed.
    #[error("invalid settings: {0}")]
    Config(#[from] toml::de::Error),

    /// Settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Whether this error is scoped to a quality tier, so a smaller tier may succeed.
    pub fn is_allocation(&self) -> bool {
        matches!(self, SimError::Allocation { .. })
    }
}
