// SPDX-License-Identifier: CEPL-1.0
mod camera;
mod xr;

pub use camera::Camera;
pub use glam::{Mat4, Quat, Vec3};
pub use xr::{projection_from_fov, view_from_pose, EyeMatrices, Fov, Pose};
