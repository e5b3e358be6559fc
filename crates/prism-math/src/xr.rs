// SPDX-License-Identifier: CEPL-1.0
//! Per-view matrices for head-mounted rendering.
//!
//! Poses and fields of view arrive from the XR runtime in its own
//! conventions (right-handed, Y up, angles in radians with left/down
//! negative). The projection targets Vulkan clip space: Y down, depth 0..1.

use glam::{Mat4, Quat, Vec3};

/// Rigid transform of a view or tracked device in a reference space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    pub fn to_mat4(self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Asymmetric field of view, angles in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

/// Matrices derived for one view of one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeMatrices {
    pub projection: Mat4,
    pub view: Mat4,
}

impl Default for EyeMatrices {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

/// Off-axis perspective projection for a runtime-reported field of view.
/// `far <= near` yields an infinite far plane.
pub fn projection_from_fov(fov: Fov, near: f32, far: f32) -> Mat4 {
    let tan_left = fov.angle_left.tan();
    let tan_right = fov.angle_right.tan();
    let tan_down = fov.angle_down.tan();
    let tan_up = fov.angle_up.tan();

    let width = tan_right - tan_left;
    // Vulkan clip space has Y pointing down.
    let height = tan_down - tan_up;

    let (z_scale, z_offset) = if far <= near {
        (-1.0, -near)
    } else {
        (-far / (far - near), -(far * near) / (far - near))
    };

    Mat4::from_cols_array(&[
        2.0 / width,
        0.0,
        0.0,
        0.0,
        0.0,
        2.0 / height,
        0.0,
        0.0,
        (tan_right + tan_left) / width,
        (tan_up + tan_down) / height,
        z_scale,
        -1.0,
        0.0,
        0.0,
        z_offset,
        0.0,
    ])
}

/// World-to-view matrix for a located view pose.
pub fn view_from_pose(pose: Pose) -> Mat4 {
    pose.to_mat4().inverse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;
    use std::f32::consts::FRAC_PI_4;

    fn symmetric() -> Fov {
        Fov {
            angle_left: -FRAC_PI_4,
            angle_right: FRAC_PI_4,
            angle_up: FRAC_PI_4,
            angle_down: -FRAC_PI_4,
        }
    }

    #[test]
    fn symmetric_fov_maps_depth_range_to_unit_interval() {
        let p = projection_from_fov(symmetric(), 0.05, 100.0);

        let near = p * Vec4::new(0.0, 0.0, -0.05, 1.0);
        let far = p * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);

        assert_relative_eq!(p.x_axis.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.y_axis.y, -1.0, epsilon = 1e-6);
        assert_relative_eq!(p.z_axis.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.z_axis.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn up_in_view_space_is_negative_y_in_clip_space() {
        let p = projection_from_fov(symmetric(), 0.1, 10.0);
        let clip = p * Vec4::new(0.0, 1.0, -2.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn asymmetric_fov_shifts_center() {
        let fov = Fov {
            angle_left: -0.9,
            angle_right: 0.7,
            angle_up: 0.8,
            angle_down: -0.8,
        };
        let p = projection_from_fov(fov, 0.1, 10.0);
        // The frustum leans left, so the optical axis lands right of center.
        let clip = p * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert!(clip.x / clip.w > 0.0);
    }

    #[test]
    fn infinite_far_plane_when_far_not_beyond_near() {
        let p = projection_from_fov(symmetric(), 0.1, 0.0);
        let distant = p * Vec4::new(0.0, 0.0, -1.0e6, 1.0);
        assert_relative_eq!(distant.z / distant.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn identity_pose_gives_identity_view() {
        assert!(view_from_pose(Pose::IDENTITY).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn view_moves_world_opposite_to_head() {
        let pose = Pose {
            orientation: Quat::IDENTITY,
            position: Vec3::new(0.0, 1.6, 0.0),
        };
        let v = view_from_pose(pose);
        let p = v.transform_point3(Vec3::new(0.0, 1.6, -1.0));
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-6));
    }

    #[test]
    fn rotated_head_sees_point_in_front() {
        let pose = Pose {
            orientation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            position: Vec3::ZERO,
        };
        // Turning left by 90 degrees puts -X in front of the viewer.
        let p = view_from_pose(pose).transform_point3(Vec3::new(-3.0, 0.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -3.0), 1e-5));
    }
}
