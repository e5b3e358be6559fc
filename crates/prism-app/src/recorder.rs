// SPDX-License-Identifier: CEPL-1.0
//! Built-in clear pass. Scene drawing plugs in as another `CommandRecorder`.

use anyhow::Result;
use prism_math::{Camera, Mat4};
use prism_render::RenderSize;
use prism_render_vk::ash::{self, vk};
use prism_render_vk::{CommandRecorder, ViewTarget};
use tracing::debug;

pub const DEFAULT_CLEAR: [f32; 4] = [0.02, 0.02, 0.04, 1.0];

pub struct ClearRecorder {
    clear: [f32; 4],
    camera: Camera,
    /// Last view-projection handed to a target, window camera or eye.
    view_proj: Mat4,
}

impl ClearRecorder {
    pub fn new(clear: [f32; 4]) -> Self {
        Self {
            clear,
            camera: Camera::default(),
            view_proj: Mat4::IDENTITY,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }

    fn clear_values(&self) -> [vk::ClearValue; 2] {
        [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ]
    }
}

impl Default for ClearRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CLEAR)
    }
}

impl CommandRecorder for ClearRecorder {
    fn record(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        target: &ViewTarget,
    ) -> Result<()> {
        self.view_proj = match target.eye {
            Some(eye) => eye.projection * eye.view,
            None => self.camera.projection() * self.camera.view(),
        };

        let cmd = target.command_buffer;
        let clear = self.clear_values();
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        let pass = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass,
            framebuffer: target.framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            },
            clear_value_count: clear.len() as u32,
            p_clear_values: clear.as_ptr(),
            ..Default::default()
        };

        // SAFETY: the buffer comes from a resettable pool and is not pending;
        // the presenter waits for it before re-recording.
        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(cmd, &begin)?;
            device.cmd_begin_render_pass(cmd, &pass, vk::SubpassContents::INLINE);
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)?;
        }
        Ok(())
    }

    fn resized(&mut self, size: RenderSize) {
        self.camera.set_aspect(size.width, size.height);
        debug!("camera aspect now {:.3}", self.camera.aspect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_aspect() {
        let mut rec = ClearRecorder::default();
        rec.resized(RenderSize::new(1920, 1080));
        assert!((rec.camera().aspect() - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn zero_size_keeps_aspect() {
        let mut rec = ClearRecorder::default();
        rec.resized(RenderSize::new(800, 400));
        rec.resized(RenderSize::new(0, 400));
        assert_eq!(rec.camera().aspect(), 2.0);
    }

    #[test]
    fn clear_values_carry_color_and_far_depth() {
        let rec = ClearRecorder::new([0.1, 0.2, 0.3, 1.0]);
        let [color, depth] = rec.clear_values();
        unsafe {
            assert_eq!(color.color.float32, [0.1, 0.2, 0.3, 1.0]);
            assert_eq!(depth.depth_stencil.depth, 1.0);
        }
    }
}
