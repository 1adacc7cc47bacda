//! Initial particle state.
//!
//! Produces the two seed fields a simulation starts from and is reset to:
//! positions uniformly inside a ball, each with a random remaining lifetime,
//! and small random velocities.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SeedConfig;
use crate::kernels;

/// One RGBA32F texel: `(x, y, z, w)`.
pub type Texel = [f32; 4];

/// Seed contents for the position and velocity fields, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedData {
    pub edge: u32,
    /// `(x, y, z, remaining_lifetime)` per particle.
    pub positions: Vec<Texel>,
    /// `(vx, vy, vz, 1.0)` per particle.
    pub velocities: Vec<Texel>,
}

impl SeedData {
    /// Generate seed fields for an `edge × edge` grid.
    ///
    /// Lifetimes follow the same `(0, max_life]` policy as the respawn
    /// branch of the position stage.
    pub fn generate<R: Rng>(edge: u32, config: &SeedConfig, max_life: f32, rng: &mut R) -> Self {
        let count = (edge as usize) * (edge as usize);
        let mut positions = Vec::with_capacity(count);
        let mut velocities = Vec::with_capacity(count);

        for _ in 0..count {
            let p = random_in_sphere(rng, config.radius);
            let life = kernels::spawn_lifetime(rng.gen::<f32>(), max_life);
            positions.push([p.x, p.y, p.z, life]);

            let s = config.velocity_scale;
            velocities.push([
                rng.gen_range(-1.0f32..=1.0) * s,
                rng.gen_range(-1.0f32..=1.0) * s,
                rng.gen_range(-1.0f32..=1.0) * s,
                1.0,
            ]);
        }

        Self {
            edge,
            positions,
            velocities,
        }
    }

    /// Generate with a deterministic RNG.
    pub fn seeded(edge: u32, config: &SeedConfig, max_life: f32, seed: u64) -> Self {
        Self::generate(edge, config, max_life, &mut StdRng::seed_from_u64(seed))
    }

    /// Number of particles described.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Uniform point inside a ball of `radius` centred at the origin.
pub fn random_in_sphere<R: Rng>(rng: &mut R, radius: f32) -> Vec3 {
    kernels::sphere_point(rng.gen(), rng.gen(), rng.gen(), radius)
}
