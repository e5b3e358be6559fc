// SPDX-License-Identifier: CEPL-1.0
//! XR presentation behind the [`Presenter`] interface.
//!
//! The compositor's frame wait is the throttle here: there is no acquire
//! semaphore and no present. Each frame records every view, submits them in
//! one batch and waits for the queue before handing the images back.

use anyhow::{Context, Result};
use ash::vk;
use prism_math::Pose;
use prism_render::{FrameStatus, Presenter, RenderSize};
use prism_render_vk::{
    create_color_view, create_render_pass, CommandRecorder, Device, Frame, RenderTargets,
    VkContext, VkError, VkTargets, ViewTarget,
};
use tracing::{info, warn};

use crate::driver::{FrameDriver, XrFrame};
use crate::instance::XrInstance;
use crate::runtime::XrRuntime;
use crate::session::OpenXrRuntime;

struct ViewResources {
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    targets: RenderTargets<VkTargets>,
}

pub struct XrPresenter {
    recorder: Box<dyn CommandRecorder>,
    views: Vec<ViewResources>,
    backend: VkTargets,
    format: vk::Format,
    submit_buffers: Vec<vk::CommandBuffer>,
    spare_targets: Vec<ViewTarget>,
    frame_index: u64,
    // Session goes before the device it renders with.
    driver: FrameDriver<OpenXrRuntime>,
    device: Device,
    _context: VkContext,
    xr: XrInstance,
}

impl XrPresenter {
    pub fn new(xr: XrInstance, recorder: Box<dyn CommandRecorder>) -> Result<Self> {
        let (context, device) = xr
            .create_vulkan()
            .context("creating Vulkan objects for the XR runtime")?;
        let runtime =
            OpenXrRuntime::new(&xr, &context, &device).context("creating XR session")?;
        let format = runtime.color_format();

        let depth_format = device.supported_depth_format()?;
        let render_pass = create_render_pass(
            device.logical(),
            format,
            depth_format,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )?;
        let backend = VkTargets::new(&device, render_pass, depth_format);
        let view_count = runtime.view_count();

        let mut presenter = Self {
            recorder,
            views: Vec::with_capacity(view_count),
            backend,
            format,
            submit_buffers: Vec::with_capacity(view_count),
            spare_targets: Vec::with_capacity(view_count),
            frame_index: 0,
            driver: FrameDriver::new(runtime),
            device,
            _context: context,
            xr,
        };
        presenter.build_views().context("building XR render targets")?;
        info!(
            "XR presenter ready: {} views, {:?}",
            presenter.views.len(),
            presenter.format
        );
        Ok(presenter)
    }

    fn build_views(&mut self) -> Result<()> {
        let logical = self.device.logical();
        for view in 0..self.driver.view_count() {
            let Some(swapchain) = self.driver.runtime().swapchain(view) else {
                anyhow::bail!("no swapchain for view {view}");
            };
            let images = swapchain.images().to_vec();
            let extent = swapchain.extent();

            // Pushed first so teardown finds whatever gets created.
            self.views.push(ViewResources {
                images: Vec::new(),
                image_views: Vec::with_capacity(images.len()),
                targets: RenderTargets::empty(),
            });
            let res = &mut self.views[view];
            for &image in &images {
                res.image_views
                    .push(create_color_view(logical, image, self.format)?);
            }
            res.images = images;
            res.targets
                .rebuild(&self.backend, &res.image_views, extent)?;
        }

        if let Some(first) = self.views.first() {
            let extent = first.targets.extent();
            self.recorder
                .resized(RenderSize::new(extent.width, extent.height));
        }
        Ok(())
    }

    /// Most recently located head pose in the LOCAL space.
    pub fn head_pose(&self) -> Pose {
        self.driver.head_pose()
    }

    pub fn hand_pose(&self, hand: usize) -> Option<Pose> {
        self.driver.runtime().hand_pose(hand)
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.backend.render_pass()
    }

    pub fn xr_instance(&self) -> &XrInstance {
        &self.xr
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn view_target(&self, view: usize) -> Result<ViewTarget> {
        let res = &self.views[view];
        let Some(image_index) = self.driver.image_index(view) else {
            anyhow::bail!("no acquired image for view {view}");
        };
        let i = image_index as usize;
        let (Some(framebuffer), Some(command_buffer), Some(&image)) = (
            res.targets.framebuffer(i),
            res.targets.command_buffer(i),
            res.images.get(i),
        ) else {
            anyhow::bail!("no render target for view {view} image {image_index}");
        };
        Ok(ViewTarget {
            view: view as u32,
            image_index,
            image,
            command_buffer,
            framebuffer,
            extent: res.targets.extent(),
            eye: self.driver.eye(view),
        })
    }
}

impl Presenter for XrPresenter {
    type Frame = Frame;
    type Format = vk::Format;

    fn prepare_frame(&mut self) -> Result<FrameStatus<Frame>> {
        match self.driver.begin_frame()? {
            XrFrame::Ended => Ok(FrameStatus::Exit),
            XrFrame::Skipped => Ok(FrameStatus::Skipped),
            XrFrame::Render { .. } => {
                let mut targets = std::mem::take(&mut self.spare_targets);
                targets.clear();
                let render_pass = self.backend.render_pass();
                for view in 0..self.views.len() {
                    let target = self.view_target(view)?;
                    self.recorder
                        .record(self.device.logical(), render_pass, &target)
                        .with_context(|| format!("recording XR view {view}"))?;
                    targets.push(target);
                }
                Ok(FrameStatus::Ready(Frame {
                    index: self.frame_index,
                    slot: 0,
                    views: targets,
                }))
            }
        }
    }

    fn submit_frame(&mut self, frame: Frame) -> Result<()> {
        let logical = self.device.logical();
        let queue = self.device.graphics_queue();

        self.submit_buffers.clear();
        self.submit_buffers
            .extend(frame.views.iter().map(|t| t.command_buffer));
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: self.submit_buffers.len() as u32,
            p_command_buffers: self.submit_buffers.as_ptr(),
            ..Default::default()
        };
        unsafe {
            logical
                .queue_submit(queue, std::slice::from_ref(&submit), vk::Fence::null())
                .map_err(VkError::call("vkQueueSubmit"))?;
            logical
                .queue_wait_idle(queue)
                .map_err(VkError::call("vkQueueWaitIdle"))?;
        }

        self.driver.end_frame()?;
        self.spare_targets = frame.views;
        self.frame_index += 1;
        Ok(())
    }

    fn current_extent(&self) -> RenderSize {
        self.views
            .first()
            .map(|v| {
                let e = v.targets.extent();
                RenderSize::new(e.width, e.height)
            })
            .unwrap_or_default()
    }

    fn current_color_format(&self) -> vk::Format {
        self.format
    }

    fn request_exit(&mut self) {
        if let Err(e) = self.driver.request_exit() {
            warn!("XR exit request failed: {e}");
        }
    }
}

impl Drop for XrPresenter {
    fn drop(&mut self) {
        let logical = self.device.logical();
        if let Err(e) = self.device.wait_idle() {
            warn!("wait idle before XR teardown: {e}");
        }
        for mut res in self.views.drain(..) {
            res.targets.release(&self.backend);
            for view in res.image_views.drain(..) {
                unsafe { logical.destroy_image_view(view, None) };
            }
        }
        unsafe { logical.destroy_render_pass(self.backend.render_pass(), None) };
        info!("XR presenter torn down after {} frames", self.frame_index);
    }
}
