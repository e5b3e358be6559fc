// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Quat, Vec3};

/// Desktop perspective camera. Movement is driven by the application; the
/// presentation layer only keeps the aspect ratio in sync with the swapchain.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Camera {
    pub fn new(fov_y: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            fov_y,
            near,
            far,
            aspect: 1.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Zero-sized extents (minimised windows) keep the previous ratio.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position).inverse()
    }

    /// Right-handed, depth 0..1, Y flipped for Vulkan.
    pub fn projection(&self) -> Mat4 {
        let mut p = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        p.y_axis.y = -p.y_axis.y;
        p
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(60f32.to_radians(), 0.1, 256.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn aspect_tracks_extent() {
        let mut cam = Camera::default();
        cam.set_aspect(1920, 1080);
        assert_relative_eq!(cam.aspect(), 16.0 / 9.0);
    }

    #[test]
    fn zero_extent_keeps_previous_aspect() {
        let mut cam = Camera::default();
        cam.set_aspect(800, 400);
        cam.set_aspect(0, 400);
        cam.set_aspect(800, 0);
        assert_relative_eq!(cam.aspect(), 2.0);
    }

    #[test]
    fn projection_is_y_flipped() {
        let cam = Camera::default();
        assert!(cam.projection().y_axis.y < 0.0);
    }
}
