//! Orbit camera for viewing the particle field.

use glam::{Mat4, Vec3};

/// Orbit camera around a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
}

impl Camera {
    const MIN_DISTANCE: f32 = 1.0;
    const MAX_DISTANCE: f32 = 400.0;
    const PITCH_LIMIT: f32 = 1.5;
    const DRAG_SPEED: f32 = 0.005;

    /// Camera framing a cloud of the given radius.
    pub fn framing(radius: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.3,
            distance: (radius * 4.0).clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE),
            target: Vec3::ZERO,
            fov_y: 45.0_f32.to_radians(),
        }
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Projection times view for a viewport of the given aspect ratio.
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let far = self.distance * 4.0 + 500.0;
        Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), 0.1, far) * self.view_matrix()
    }

    /// Rotate by a mouse drag in pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * Self::DRAG_SPEED;
        self.pitch = (self.pitch + dy * Self::DRAG_SPEED).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    /// Move toward (positive) or away from the target proportionally to the distance.
    pub fn zoom(&mut self, scroll: f32) {
        self.distance =
            (self.distance * (1.0 - scroll * 0.1)).clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::framing(3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_at_distance() {
        let camera = Camera::framing(5.0);
        assert!((camera.position().length() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.orbit(0.0, 10_000.0);
        assert_eq!(camera.pitch, 1.5);
        camera.orbit(0.0, -100_000.0);
        assert_eq!(camera.pitch, -1.5);
    }

    #[test]
    fn test_zoom_stays_in_range() {
        let mut camera = Camera::default();
        for _ in 0..100 {
            camera.zoom(5.0);
        }
        assert_eq!(camera.distance, 1.0);
    }

    #[test]
    fn test_target_projects_to_centre() {
        let camera = Camera::framing(2.0);
        let clip = camera.view_proj(16.0 / 9.0) * camera.target.extend(1.0);
        assert!((clip.x / clip.w).abs() < 1e-5);
        assert!((clip.y / clip.w).abs() < 1e-5);
    }
}
