//! Per-texel update law.
//!
//! These functions are the host-side statement of what the velocity and
//! position fragment programs compute for one particle. The CPU backend
//! runs them directly; `velocity.wgsl` and `position.wgsl` implement the
//! same formulas with the same constants and the same integer hash, so a
//! GPU run and a CPU run agree to within float tolerance.

use std::f32::consts::TAU;

use glam::{Vec3, Vec4, Vec4Swizzles};

use crate::uniforms::{PositionUniforms, VelocityUniforms};

/// Floor on the audio modulation so silence never switches turbulence fully off.
pub const CURL_FLOOR: f32 = 1e-5;
/// Largest delta a simulation stage will integrate in one step.
pub const MAX_DELTA: f32 = 1.0;
/// Fraction of outward radial velocity bounced back at the boundary.
pub const RESTITUTION: f32 = 0.5;
/// Inward acceleration per unit of overshoot past the boundary.
pub const BOUNDARY_PULL: f32 = 4.0;
/// Spatial frequency of the turbulence field.
pub const NOISE_FREQUENCY: f32 = 0.75;

/// Effective curl scale: `curl_strength * max(level * flag, CURL_FLOOR)`.
#[inline]
pub fn curl_scale(curl_strength: f32, audio_level: f32, audio_flag: f32) -> f32 {
    curl_strength * (audio_level * audio_flag).max(CURL_FLOOR)
}

/// Clamp a raw frame delta into the range a stage may integrate.
#[inline]
pub fn clamp_delta(delta: f32) -> f32 {
    if delta.is_nan() {
        0.0
    } else {
        delta.clamp(0.0, MAX_DELTA)
    }
}

/// Curl of the vector potential
/// `A = (sin(y+1.7)cos(1.31z), sin(z+4.1)cos(1.17x), sin(x+2.3)cos(1.23y))`,
/// evaluated analytically. Smooth, bounded and divergence-free.
pub fn curl_noise(p: Vec3) -> Vec3 {
    let (x, y, z) = (p.x, p.y, p.z);

    let daz_dy = -1.23 * (x + 2.3).sin() * (1.23 * y).sin();
    let day_dz = (z + 4.1).cos() * (1.17 * x).cos();
    let dax_dz = -1.31 * (y + 1.7).sin() * (1.31 * z).sin();
    let daz_dx = (x + 2.3).cos() * (1.23 * y).cos();
    let day_dx = -1.17 * (z + 4.1).sin() * (1.17 * x).sin();
    let dax_dy = (y + 1.7).cos() * (1.31 * z).cos();

    Vec3::new(daz_dy - day_dz, dax_dz - daz_dx, day_dx - dax_dy)
}

/// Boundary containment for a particle at `p` moving with `v`.
///
/// Inside the sphere the velocity is returned unchanged. Outside, positive
/// radial velocity is reflected with [`RESTITUTION`] and an inward pull
/// proportional to the overshoot is added, so the radial component never
/// grows.
pub fn contain(p: Vec3, v: Vec3, radius: f32, dt: f32) -> Vec3 {
    let r = p.length();
    if r <= radius || r == 0.0 {
        return v;
    }
    let n = p / r;
    let radial = v.dot(n);
    let mut out = v;
    if radial > 0.0 {
        out -= n * radial * (1.0 + RESTITUTION);
    }
    out - n * (r - radius) * BOUNDARY_PULL * dt
}

/// Next velocity texel. `w` is reserved and carried through.
pub fn velocity_texel(pos: Vec4, vel: Vec4, u: &VelocityUniforms) -> Vec4 {
    let p = pos.xyz();
    let v = vel.xyz();
    let dt = u.delta_time;

    let turbulence = curl_noise(p * NOISE_FREQUENCY) * u.curl_scale;
    let damped = (v + (u.force() + turbulence) * dt) * u.damping;
    contain(p, damped, u.boundary_radius, dt).extend(vel.w)
}

/// Next position texel: age the particle, then either integrate or respawn.
pub fn position_texel(pos: Vec4, vel: Vec4, index: u32, u: &PositionUniforms) -> Vec4 {
    let life = pos.w - u.delta_time;
    if life <= 0.0 {
        return respawn(index, u);
    }
    (pos.xyz() + vel.xyz() * u.delta_time).extend(life)
}

/// Fresh position and lifetime for particle `index`, salted by the frame time.
pub fn respawn(index: u32, u: &PositionUniforms) -> Vec4 {
    let salt = pcg_hash(u.time.to_bits());
    let h1 = pcg_hash(index.wrapping_add(salt));
    let h2 = pcg_hash(h1);
    let h3 = pcg_hash(h2);
    let h4 = pcg_hash(h3);

    let p = sphere_point(unit_float(h1), unit_float(h2), unit_float(h3), u.spawn_radius);
    p.extend(spawn_lifetime(unit_float(h4), u.max_life))
}

/// Point in a ball of `radius` from three uniforms in `[0, 1)`.
///
/// Uniform over the volume: polar angle from `acos(2u - 1)`, radius from the
/// cube root.
#[inline]
pub fn sphere_point(u_theta: f32, u_phi: f32, u_r: f32, radius: f32) -> Vec3 {
    let theta = (u_theta * 2.0 - 1.0).clamp(-1.0, 1.0).acos();
    let phi = u_phi * TAU;
    let r = radius * u_r.powf(1.0 / 3.0);
    let sin_theta = theta.sin();
    Vec3::new(
        r * sin_theta * phi.cos(),
        r * sin_theta * phi.sin(),
        r * theta.cos(),
    )
}

/// Lifetime drawn from `(0, max_life]` given `u` in `[0, 1)`.
#[inline]
pub fn spawn_lifetime(u: f32, max_life: f32) -> f32 {
    max_life * (1.0 - u)
}

/// PCG hash (one round of the PCG-RXS-M-XS permutation).
#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Top 24 bits of a hash as a float in `[0, 1)`.
#[inline]
pub fn unit_float(h: u32) -> f32 {
    (h >> 8) as f32 * (1.0 / 16_777_216.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimParams;

    fn velocity_uniforms(dt: f32, radius: f32) -> VelocityUniforms {
        VelocityUniforms {
            force: [0.0; 3],
            delta_time: dt,
            damping: 1.0,
            boundary_radius: radius,
            curl_scale: 0.0,
            _padding: 0.0,
        }
    }

    fn position_uniforms(dt: f32) -> PositionUniforms {
        PositionUniforms::new(&SimParams::default(), 2.0, dt, 3.25)
    }

    #[test]
    fn test_clamp_delta() {
        assert_eq!(clamp_delta(5.0), MAX_DELTA);
        assert_eq!(clamp_delta(-1.0), 0.0);
        assert_eq!(clamp_delta(f32::NAN), 0.0);
        assert_eq!(clamp_delta(0.016), 0.016);
    }

    #[test]
    fn test_curl_scale_floor() {
        assert_eq!(curl_scale(1.0, 0.0, 1.0), CURL_FLOOR);
        assert_eq!(curl_scale(1.0, 0.8, 0.0), CURL_FLOOR);
        assert_eq!(curl_scale(2.0, 0.5, 1.0), 1.0);
        assert_eq!(curl_scale(0.0, 0.5, 1.0), 0.0);
    }

    #[test]
    fn test_curl_noise_divergence_free() {
        let h = 1e-2;
        for &p in &[
            Vec3::new(0.3, -1.2, 0.7),
            Vec3::new(2.0, 0.5, -3.1),
            Vec3::new(-0.9, 1.9, 0.0),
        ] {
            let dx = (curl_noise(p + Vec3::X * h).x - curl_noise(p - Vec3::X * h).x) / (2.0 * h);
            let dy = (curl_noise(p + Vec3::Y * h).y - curl_noise(p - Vec3::Y * h).y) / (2.0 * h);
            let dz = (curl_noise(p + Vec3::Z * h).z - curl_noise(p - Vec3::Z * h).z) / (2.0 * h);
            assert!((dx + dy + dz).abs() < 1e-2, "divergence at {p}: {}", dx + dy + dz);
        }
    }

    #[test]
    fn test_curl_noise_bounded_and_smooth() {
        let mut prev = curl_noise(Vec3::ZERO);
        for i in 1..200 {
            let p = Vec3::splat(i as f32 * 0.01);
            let c = curl_noise(p);
            assert!(c.abs().max_element() < 3.0);
            assert!((c - prev).length() < 0.25);
            prev = c;
        }
    }

    #[test]
    fn test_velocity_damps_without_forcing() {
        let mut u = velocity_uniforms(0.016, 100.0);
        u.damping = 0.9;
        let v = velocity_texel(Vec4::new(0.5, 0.0, 0.0, 1.0), Vec4::new(1.0, -2.0, 0.5, 1.0), &u);
        assert!((v.x - 0.9).abs() < 1e-6);
        assert!((v.y + 1.8).abs() < 1e-6);
        assert_eq!(v.w, 1.0);
    }

    #[test]
    fn test_velocity_applies_force() {
        let mut u = velocity_uniforms(0.5, 100.0);
        u.force = [0.0, 30.0, 0.0];
        let v = velocity_texel(Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::ZERO, &u);
        assert!((v.y - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_boundary_reduces_radial_velocity() {
        // Particle at radius 10 with boundary radius 2 and zero external force
        let p = Vec3::new(6.0, 8.0, 0.0);
        let n = p.normalize();
        for v in [n * 3.0, n * -1.0, Vec3::new(1.0, -0.5, 2.0), Vec3::ZERO] {
            let mut u = velocity_uniforms(0.016, 2.0);
            u.damping = 0.99;
            let uncorrected = (v * u.damping).dot(n);
            let out = velocity_texel(p.extend(5.0), v.extend(1.0), &u);
            assert!(out.truncate().dot(n) <= uncorrected + 1e-6);
        }
    }

    #[test]
    fn test_contain_inside_is_identity() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(contain(Vec3::new(0.5, 0.5, 0.5), v, 2.0, 0.1), v);
        assert_eq!(contain(Vec3::ZERO, v, 0.0, 0.1), v);
    }

    #[test]
    fn test_position_lifetime_decrements() {
        let u = position_uniforms(0.25);
        let out = position_texel(Vec4::new(1.0, 0.0, 0.0, 4.0), Vec4::new(2.0, 0.0, -4.0, 1.0), 7, &u);
        assert_eq!(out.w, 3.75);
        assert!(out.w < 4.0);
        assert_eq!(out.truncate(), Vec3::new(1.5, 0.0, -1.0));
    }

    #[test]
    fn test_expired_particle_respawns_in_ball() {
        let u = position_uniforms(0.016);
        for index in 0..1000 {
            let out = position_texel(Vec4::new(50.0, 50.0, 50.0, 0.0), Vec4::ONE, index, &u);
            assert!(out.truncate().length() <= u.spawn_radius * (1.0 + 1e-5));
            assert!(out.w > 0.0 && out.w <= u.max_life);
        }
    }

    #[test]
    fn test_respawn_depends_on_time_and_index() {
        let a = respawn(3, &position_uniforms(0.016));
        let b = respawn(4, &position_uniforms(0.016));
        let mut later = position_uniforms(0.016);
        later.time += 0.5;
        let c = respawn(3, &later);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, respawn(3, &position_uniforms(0.016)));
    }

    #[test]
    fn test_spawn_lifetime_range() {
        assert_eq!(spawn_lifetime(0.0, 10.0), 10.0);
        assert!(spawn_lifetime(0.999_999, 10.0) > 0.0);
    }

    #[test]
    fn test_unit_float_range() {
        assert_eq!(unit_float(0), 0.0);
        assert!(unit_float(u32::MAX) < 1.0);
    }
}
