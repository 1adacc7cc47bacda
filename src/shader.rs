//! WGSL sources for the simulation and render passes.
//!
//! The two simulation programs are fragment shaders run over the full-screen
//! quad; each fragment is one particle. The uniform structs they declare
//! match [`crate::uniforms`] byte for byte.

pub const VELOCITY_SOURCE: &str = include_str!("velocity.wgsl");
pub const POSITION_SOURCE: &str = include_str!("position.wgsl");
pub const PARTICLE_SOURCE: &str = include_str!("particles.wgsl");
