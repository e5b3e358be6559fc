// SPDX-License-Identifier: CEPL-1.0
//! Conventional window presentation behind the [`Presenter`] interface.

use anyhow::{Context, Result};
use ash::vk;
use prism_math::EyeMatrices;
use prism_render::{FrameStatus, Presenter, RenderSize};
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::VkError;
use crate::instance::VkContext;
use crate::swapchain::{AcquireOutcome, PresentOutcome, Swapchain};
use crate::sync::{FrameSyncSet, SyncDevice};
use crate::targets::{create_render_pass, RenderTargets, VkTargets};

/// One color image ready to be recorded into.
#[derive(Clone, Copy, Debug)]
pub struct ViewTarget {
    /// 0 for the window; the eye index in XR mode.
    pub view: u32,
    pub image_index: u32,
    pub image: vk::Image,
    pub command_buffer: vk::CommandBuffer,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    /// Per-eye matrices located for this frame; `None` on the window path,
    /// where the recorder's own camera applies.
    pub eye: Option<EyeMatrices>,
}

/// Handed out by `prepare_frame`, handed back to `submit_frame`.
#[derive(Debug, Default)]
pub struct Frame {
    pub index: u64,
    pub slot: usize,
    pub views: Vec<ViewTarget>,
}

/// Fills per-image command buffers. Called for every image when targets are
/// built or rebuilt, and per frame in XR mode.
pub trait CommandRecorder {
    fn record(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        target: &ViewTarget,
    ) -> Result<()>;

    /// Targets now have `size`. Runs after the device has gone idle again.
    fn resized(&mut self, _size: RenderSize) {}
}

#[derive(Clone, Copy, Debug)]
pub struct SurfaceOptions {
    pub size: RenderSize,
    pub vsync: bool,
    pub frames_in_flight: usize,
    /// Wait for the queue to drain after every present.
    pub wait_queue_idle: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            size: RenderSize::new(1280, 720),
            vsync: true,
            frames_in_flight: 2,
            wait_queue_idle: true,
        }
    }
}

/// More slots than images would only queue acquires behind each other.
pub fn clamp_frames_in_flight(requested: usize, image_count: usize) -> usize {
    requested.max(1).min(image_count.max(1))
}

/// GPU side of the window frame protocol. [`VkSurface`] drives a real
/// swapchain; [`SurfacePresenter`] only decides when to call what.
pub trait SurfaceGpu {
    type Sync: SyncDevice<Semaphore = vk::Semaphore, Fence = vk::Fence, Error = VkError>;

    fn sync_device(&self) -> &Self::Sync;
    fn wait_idle(&self) -> Result<()>;
    fn recreate_swapchain(&mut self, size: RenderSize, vsync: bool) -> Result<()>;
    fn image_count(&self) -> usize;
    fn extent(&self) -> vk::Extent2D;
    fn color_format(&self) -> vk::Format;
    /// Depth, framebuffers and command buffers for the current images.
    fn rebuild_targets(&mut self) -> Result<()>;
    fn record_all(&mut self, recorder: &mut dyn CommandRecorder) -> Result<()>;
    fn view_target(&self, image_index: u32) -> Result<ViewTarget>;
    fn acquire(&mut self, signal: vk::Semaphore) -> Result<AcquireOutcome>;
    fn submit(
        &self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()>;
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome>;
    fn queue_wait_idle(&self) -> Result<()>;
}

/// Window swapchain, its targets and the device and instance they live on.
pub struct VkSurface {
    targets: RenderTargets<VkTargets>,
    backend: VkTargets,
    swapchain: Swapchain,
    // Dropped after everything above.
    device: Device,
    context: VkContext,
}

impl VkSurface {
    /// Takes ownership of the instance, device and surface and builds the
    /// first swapchain. Targets are built by the presenter.
    pub fn new(
        context: VkContext,
        device: Device,
        surface: vk::SurfaceKHR,
        options: &SurfaceOptions,
    ) -> Result<Self> {
        let mut swapchain = Swapchain::init_surface(&context, &device, surface)
            .context("binding window surface")?;
        swapchain
            .create(options.size, options.vsync)
            .context("creating swapchain")?;

        let depth_format = device.supported_depth_format()?;
        let render_pass = create_render_pass(
            device.logical(),
            swapchain.format(),
            depth_format,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )?;
        let backend = VkTargets::new(&device, render_pass, depth_format);
        Ok(Self {
            targets: RenderTargets::empty(),
            backend,
            swapchain,
            device,
            context,
        })
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.backend.render_pass()
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.swapchain.color_space()
    }

    pub fn command_buffer(&self, image: usize) -> Option<vk::CommandBuffer> {
        self.targets.command_buffer(image)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn context(&self) -> &VkContext {
        &self.context
    }
}

impl SurfaceGpu for VkSurface {
    type Sync = ash::Device;

    fn sync_device(&self) -> &ash::Device {
        self.device.logical()
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(self.device.wait_idle()?)
    }

    fn recreate_swapchain(&mut self, size: RenderSize, vsync: bool) -> Result<()> {
        self.swapchain
            .create(size, vsync)
            .context("recreating swapchain")
    }

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn color_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    fn rebuild_targets(&mut self) -> Result<()> {
        self.targets
            .rebuild(&self.backend, self.swapchain.views(), self.swapchain.extent())?;
        Ok(())
    }

    fn record_all(&mut self, recorder: &mut dyn CommandRecorder) -> Result<()> {
        let render_pass = self.backend.render_pass();
        for image in 0..self.swapchain.image_count() {
            let target = self.view_target(image as u32)?;
            recorder
                .record(self.device.logical(), render_pass, &target)
                .with_context(|| format!("recording command buffer {image}"))?;
        }
        Ok(())
    }

    fn view_target(&self, image_index: u32) -> Result<ViewTarget> {
        let i = image_index as usize;
        let (Some(framebuffer), Some(command_buffer), Some(&image)) = (
            self.targets.framebuffer(i),
            self.targets.command_buffer(i),
            self.swapchain.images().get(i),
        ) else {
            anyhow::bail!("no render target for swapchain image {image_index}");
        };
        Ok(ViewTarget {
            view: 0,
            image_index,
            image,
            command_buffer,
            framebuffer,
            extent: self.targets.extent(),
            eye: None,
        })
    }

    fn acquire(&mut self, signal: vk::Semaphore) -> Result<AcquireOutcome> {
        Ok(self.swapchain.acquire_next_image(signal)?)
    }

    fn submit(
        &self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: &wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal,
            ..Default::default()
        };
        let queue = self.device.graphics_queue();
        unsafe {
            self.device
                .logical()
                .queue_submit(queue, std::slice::from_ref(&submit), fence)
        }
        .map_err(VkError::call("vkQueueSubmit"))?;
        Ok(())
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome> {
        let queue = self.device.graphics_queue();
        Ok(self.swapchain.queue_present(queue, image_index, Some(wait))?)
    }

    fn queue_wait_idle(&self) -> Result<()> {
        let queue = self.device.graphics_queue();
        unsafe { self.device.logical().queue_wait_idle(queue) }
            .map_err(VkError::call("vkQueueWaitIdle"))?;
        Ok(())
    }
}

impl Drop for VkSurface {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("wait idle before teardown: {e}");
        }
        self.targets.release(&self.backend);
        unsafe {
            self.device
                .logical()
                .destroy_render_pass(self.backend.render_pass(), None)
        };
        self.swapchain.destroy();
    }
}

/// Acquire, submit and present against a window swapchain, recreating it
/// whenever the surface says it no longer fits.
pub struct SurfacePresenter<G: SurfaceGpu = VkSurface> {
    recorder: Box<dyn CommandRecorder>,
    sync: FrameSyncSet<G::Sync>,
    images_in_flight: Vec<Option<vk::Fence>>,
    options: SurfaceOptions,
    size: RenderSize,
    resize_pending: bool,
    frame_index: u64,
    // Dropped after the sync set has been destroyed on it.
    gpu: G,
}

impl SurfacePresenter<VkSurface> {
    pub fn new(
        context: VkContext,
        device: Device,
        surface: vk::SurfaceKHR,
        options: SurfaceOptions,
        recorder: Box<dyn CommandRecorder>,
    ) -> Result<Self> {
        let gpu = VkSurface::new(context, device, surface, &options)?;
        Self::from_gpu(gpu, options, recorder)
    }
}

impl<G: SurfaceGpu> SurfacePresenter<G> {
    pub fn from_gpu(gpu: G, options: SurfaceOptions, recorder: Box<dyn CommandRecorder>) -> Result<Self> {
        let mut presenter = Self {
            recorder,
            sync: FrameSyncSet::new(gpu.sync_device(), 1)?,
            images_in_flight: Vec::new(),
            options,
            size: options.size,
            resize_pending: false,
            frame_index: 0,
            gpu,
        };
        presenter.rebuild().context("building render targets")?;
        Ok(presenter)
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn image_count(&self) -> usize {
        self.gpu.image_count()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.sync.len()
    }

    /// Records a size change observed outside the swapchain (window drag).
    pub fn request_resize(&mut self, size: RenderSize) {
        if size != self.size || self.images_in_flight.is_empty() {
            self.size = size;
            self.resize_pending = true;
        }
    }

    fn recreate(&mut self, size: RenderSize) -> Result<()> {
        self.size = size;
        self.gpu.wait_idle()?;
        self.gpu.recreate_swapchain(size, self.options.vsync)?;
        self.rebuild()
    }

    /// Everything that depends on the swapchain's images and extent. The
    /// device must be idle.
    fn rebuild(&mut self) -> Result<()> {
        let image_count = self.gpu.image_count();

        let slots = clamp_frames_in_flight(self.options.frames_in_flight, image_count);
        if slots < self.options.frames_in_flight {
            warn!(
                "frames in flight clamped from {} to {slots} ({image_count} swapchain images)",
                self.options.frames_in_flight
            );
        }
        self.sync.destroy(self.gpu.sync_device());
        self.sync = FrameSyncSet::new(self.gpu.sync_device(), slots)?;
        self.images_in_flight = vec![None; image_count];

        self.gpu.rebuild_targets()?;
        self.gpu.record_all(self.recorder.as_mut())?;

        self.gpu.wait_idle()?;
        self.resize_pending = false;
        let extent = self.gpu.extent();
        self.recorder
            .resized(RenderSize::new(extent.width, extent.height));
        Ok(())
    }
}

impl<G: SurfaceGpu> Presenter for SurfacePresenter<G> {
    type Frame = Frame;
    type Format = vk::Format;

    fn prepare_frame(&mut self) -> Result<FrameStatus<Frame>> {
        if self.size.is_empty() {
            return Ok(FrameStatus::Skipped);
        }
        if self.resize_pending {
            self.recreate(self.size)?;
            return Ok(FrameStatus::Skipped);
        }

        let frame_index = self.frame_index;
        let slot_index = self.sync.slot_index(frame_index);
        let slot = self.sync.acquire_slot(self.gpu.sync_device(), frame_index)?;
        let (image_available, in_flight) = (slot.image_available, slot.in_flight);

        let image_index = match self.gpu.acquire(image_available)? {
            AcquireOutcome::OutOfDate => {
                self.recreate(self.size)?;
                return Ok(FrameStatus::Skipped);
            }
            AcquireOutcome::Acquired {
                suboptimal: true, ..
            } => {
                debug!("acquire suboptimal; recreating");
                self.recreate(self.size)?;
                return Ok(FrameStatus::Skipped);
            }
            AcquireOutcome::Acquired { index, .. } => index,
        };

        let Some(guard) = self.images_in_flight.get_mut(image_index as usize) else {
            anyhow::bail!("swapchain returned image {image_index} past its image count");
        };
        // The image may still be guarded by another slot's submission.
        let previous = guard.replace(in_flight);
        if let Some(fence) = previous.filter(|&f| f != in_flight) {
            self.gpu.sync_device().wait_fence(fence, u64::MAX)?;
        }

        let target = self.gpu.view_target(image_index)?;
        Ok(FrameStatus::Ready(Frame {
            index: frame_index,
            slot: slot_index,
            views: vec![target],
        }))
    }

    fn submit_frame(&mut self, frame: Frame) -> Result<()> {
        let Some(target) = frame.views.first() else {
            anyhow::bail!("frame {} has no views", frame.index);
        };
        let slot = self.sync.slot(frame.slot);
        let (image_available, render_finished, in_flight) =
            (slot.image_available, slot.render_finished, slot.in_flight);

        self.sync.reset_slot(self.gpu.sync_device(), frame.slot)?;
        self.gpu
            .submit(target.command_buffer, image_available, render_finished, in_flight)?;

        match self.gpu.present(target.image_index, render_finished)? {
            PresentOutcome::Presented => {}
            PresentOutcome::OutOfDate => {
                self.recreate(self.size)?;
            }
            PresentOutcome::Suboptimal => {
                self.resize_pending = true;
            }
        }

        if self.options.wait_queue_idle {
            self.gpu.queue_wait_idle()?;
        }
        self.frame_index += 1;
        Ok(())
    }

    fn current_extent(&self) -> RenderSize {
        let e = self.gpu.extent();
        RenderSize::new(e.width, e.height)
    }

    fn current_color_format(&self) -> vk::Format {
        self.gpu.color_format()
    }

    fn resize(&mut self, size: RenderSize) {
        self.request_resize(size);
    }
}

impl<G: SurfaceGpu> Drop for SurfacePresenter<G> {
    fn drop(&mut self) {
        if let Err(e) = self.gpu.wait_idle() {
            warn!("wait idle before teardown: {e}");
        }
        self.sync.destroy(self.gpu.sync_device());
        info!("surface presenter torn down after {} frames", self.frame_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Call {
        WaitIdle,
        Recreate(u32, u32),
        RebuildTargets,
        RecordAll,
        Resized(u32, u32),
        WaitFence(vk::Fence),
        ResetFence(vk::Fence),
        Acquire,
        Submit(vk::Fence),
        Present(u32),
        QueueIdle,
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    fn take(log: &Log) -> Vec<Call> {
        std::mem::take(&mut *log.borrow_mut())
    }

    struct MockSync {
        log: Log,
        next: Cell<u64>,
    }

    impl MockSync {
        fn handle(&self) -> u64 {
            let raw = self.next.get();
            self.next.set(raw + 1);
            raw
        }
    }

    impl SyncDevice for MockSync {
        type Semaphore = vk::Semaphore;
        type Fence = vk::Fence;
        type Error = VkError;

        fn create_semaphore(&self) -> Result<vk::Semaphore, VkError> {
            Ok(vk::Semaphore::from_raw(self.handle()))
        }

        fn create_fence(&self, _signaled: bool) -> Result<vk::Fence, VkError> {
            Ok(vk::Fence::from_raw(self.handle()))
        }

        fn wait_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> Result<(), VkError> {
            self.log.borrow_mut().push(Call::WaitFence(fence));
            Ok(())
        }

        fn reset_fence(&self, fence: vk::Fence) -> Result<(), VkError> {
            self.log.borrow_mut().push(Call::ResetFence(fence));
            Ok(())
        }

        fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {}

        fn destroy_fence(&self, _fence: vk::Fence) {}
    }

    /// Swapchain whose acquire and present results are scripted.
    struct MockGpu {
        log: Log,
        sync: MockSync,
        images: usize,
        extent: vk::Extent2D,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
    }

    impl SurfaceGpu for MockGpu {
        type Sync = MockSync;

        fn sync_device(&self) -> &MockSync {
            &self.sync
        }

        fn wait_idle(&self) -> Result<()> {
            self.log.borrow_mut().push(Call::WaitIdle);
            Ok(())
        }

        fn recreate_swapchain(&mut self, size: RenderSize, _vsync: bool) -> Result<()> {
            self.log
                .borrow_mut()
                .push(Call::Recreate(size.width, size.height));
            self.extent = vk::Extent2D {
                width: size.width,
                height: size.height,
            };
            Ok(())
        }

        fn image_count(&self) -> usize {
            self.images
        }

        fn extent(&self) -> vk::Extent2D {
            self.extent
        }

        fn color_format(&self) -> vk::Format {
            vk::Format::B8G8R8A8_SRGB
        }

        fn rebuild_targets(&mut self) -> Result<()> {
            self.log.borrow_mut().push(Call::RebuildTargets);
            Ok(())
        }

        fn record_all(&mut self, _recorder: &mut dyn CommandRecorder) -> Result<()> {
            self.log.borrow_mut().push(Call::RecordAll);
            Ok(())
        }

        fn view_target(&self, image_index: u32) -> Result<ViewTarget> {
            Ok(ViewTarget {
                view: 0,
                image_index,
                image: vk::Image::null(),
                command_buffer: vk::CommandBuffer::from_raw(100 + u64::from(image_index)),
                framebuffer: vk::Framebuffer::null(),
                extent: self.extent,
                eye: None,
            })
        }

        fn acquire(&mut self, _signal: vk::Semaphore) -> Result<AcquireOutcome> {
            self.log.borrow_mut().push(Call::Acquire);
            Ok(self.acquires.pop_front().unwrap_or(AcquireOutcome::Acquired {
                index: 0,
                suboptimal: false,
            }))
        }

        fn submit(
            &self,
            _command_buffer: vk::CommandBuffer,
            _wait: vk::Semaphore,
            _signal: vk::Semaphore,
            fence: vk::Fence,
        ) -> Result<()> {
            self.log.borrow_mut().push(Call::Submit(fence));
            Ok(())
        }

        fn present(&mut self, image_index: u32, _wait: vk::Semaphore) -> Result<PresentOutcome> {
            self.log.borrow_mut().push(Call::Present(image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn queue_wait_idle(&self) -> Result<()> {
            self.log.borrow_mut().push(Call::QueueIdle);
            Ok(())
        }
    }

    struct LogRecorder(Log);

    impl CommandRecorder for LogRecorder {
        fn record(
            &mut self,
            _device: &ash::Device,
            _render_pass: vk::RenderPass,
            _target: &ViewTarget,
        ) -> Result<()> {
            Ok(())
        }

        fn resized(&mut self, size: RenderSize) {
            self.0
                .borrow_mut()
                .push(Call::Resized(size.width, size.height));
        }
    }

    fn presenter(
        acquires: Vec<AcquireOutcome>,
        presents: Vec<PresentOutcome>,
    ) -> (SurfacePresenter<MockGpu>, Log) {
        let log = Log::default();
        let gpu = MockGpu {
            log: log.clone(),
            sync: MockSync {
                log: log.clone(),
                next: Cell::new(1),
            },
            images: 3,
            extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            acquires: acquires.into(),
            presents: presents.into(),
        };
        let p = SurfacePresenter::from_gpu(
            gpu,
            SurfaceOptions::default(),
            Box::new(LogRecorder(log.clone())),
        )
        .unwrap();
        take(&log);
        (p, log)
    }

    fn rebuilt(width: u32, height: u32) -> Vec<Call> {
        vec![
            Call::WaitIdle,
            Call::Recreate(width, height),
            Call::RebuildTargets,
            Call::RecordAll,
            Call::WaitIdle,
            Call::Resized(width, height),
        ]
    }

    fn ready(p: &mut SurfacePresenter<MockGpu>) -> Frame {
        match p.prepare_frame().unwrap() {
            FrameStatus::Ready(frame) => frame,
            other => panic!("expected a frame, got {other:?}"),
        }
    }

    fn skipped(p: &mut SurfacePresenter<MockGpu>) -> bool {
        matches!(p.prepare_frame().unwrap(), FrameStatus::Skipped)
    }

    #[test]
    fn first_build_records_every_image_and_sizes_the_recorder() {
        let log = Log::default();
        let gpu = MockGpu {
            log: log.clone(),
            sync: MockSync {
                log: log.clone(),
                next: Cell::new(1),
            },
            images: 3,
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            acquires: VecDeque::new(),
            presents: VecDeque::new(),
        };
        let p = SurfacePresenter::from_gpu(
            gpu,
            SurfaceOptions::default(),
            Box::new(LogRecorder(log.clone())),
        )
        .unwrap();
        assert_eq!(
            take(&log),
            vec![
                Call::RebuildTargets,
                Call::RecordAll,
                Call::WaitIdle,
                Call::Resized(640, 480)
            ]
        );
        assert_eq!(p.frames_in_flight(), 2);
        assert_eq!(p.image_count(), 3);
    }

    #[test]
    fn normal_frame_acquires_submits_and_presents() {
        let (mut p, log) = presenter(vec![], vec![]);
        let f0 = p.sync.slot(0).in_flight;

        let frame = ready(&mut p);
        assert_eq!((frame.index, frame.slot), (0, 0));
        assert_eq!(take(&log), vec![Call::WaitFence(f0), Call::Acquire]);

        p.submit_frame(frame).unwrap();
        assert_eq!(
            take(&log),
            vec![
                Call::ResetFence(f0),
                Call::Submit(f0),
                Call::Present(0),
                Call::QueueIdle
            ]
        );
        assert_eq!(ready(&mut p).slot, 1);
    }

    #[test]
    fn resize_rebuilds_in_order_before_the_next_frame() {
        let (mut p, log) = presenter(vec![], vec![]);
        p.resize(RenderSize::new(800, 600));
        assert!(skipped(&mut p));
        assert_eq!(take(&log), rebuilt(800, 600));
        assert_eq!(p.current_extent(), RenderSize::new(800, 600));

        // Same size again is not a resize.
        p.resize(RenderSize::new(800, 600));
        ready(&mut p);
        assert!(!take(&log).contains(&Call::Recreate(800, 600)));
    }

    #[test]
    fn zero_size_window_skips_without_touching_the_gpu() {
        let (mut p, log) = presenter(vec![], vec![]);
        p.resize(RenderSize::new(0, 600));
        assert!(skipped(&mut p));
        assert!(skipped(&mut p));
        assert!(take(&log).is_empty());

        p.resize(RenderSize::new(1024, 768));
        assert!(skipped(&mut p));
        assert_eq!(take(&log), rebuilt(1024, 768));
        assert_eq!(ready(&mut p).index, 0);
    }

    #[test]
    fn out_of_date_acquire_recreates_and_skips() {
        let (mut p, log) = presenter(vec![AcquireOutcome::OutOfDate], vec![]);
        let f0 = p.sync.slot(0).in_flight;

        assert!(skipped(&mut p));
        let mut expected = vec![Call::WaitFence(f0), Call::Acquire];
        expected.extend(rebuilt(1280, 720));
        assert_eq!(take(&log), expected);

        // The skipped frame does not advance the frame counter.
        assert_eq!(ready(&mut p).index, 0);
    }

    #[test]
    fn suboptimal_acquire_recreates_and_skips() {
        let (mut p, log) = presenter(
            vec![AcquireOutcome::Acquired {
                index: 1,
                suboptimal: true,
            }],
            vec![],
        );
        assert!(skipped(&mut p));
        let calls = take(&log);
        assert!(calls.ends_with(&rebuilt(1280, 720)));
        assert!(p.images_in_flight.iter().all(Option::is_none));
    }

    #[test]
    fn suboptimal_present_recreates_on_the_next_frame() {
        let (mut p, log) = presenter(vec![], vec![PresentOutcome::Suboptimal]);
        let frame = ready(&mut p);
        take(&log);

        p.submit_frame(frame).unwrap();
        let calls = take(&log);
        assert!(calls.contains(&Call::Present(0)));
        assert!(!calls.contains(&Call::Recreate(1280, 720)));

        assert!(skipped(&mut p));
        assert_eq!(take(&log), rebuilt(1280, 720));
        ready(&mut p);
    }

    #[test]
    fn out_of_date_present_recreates_before_the_queue_drains() {
        let (mut p, log) = presenter(vec![], vec![PresentOutcome::OutOfDate]);
        let f0 = p.sync.slot(0).in_flight;
        let frame = ready(&mut p);
        take(&log);

        p.submit_frame(frame).unwrap();
        let mut expected = vec![Call::ResetFence(f0), Call::Submit(f0), Call::Present(0)];
        expected.extend(rebuilt(1280, 720));
        expected.push(Call::QueueIdle);
        assert_eq!(take(&log), expected);
        assert_eq!(p.frame_index, 1);
    }

    #[test]
    fn image_guarded_by_another_slot_waits_for_that_fence() {
        let acquired = AcquireOutcome::Acquired {
            index: 0,
            suboptimal: false,
        };
        let (mut p, log) = presenter(vec![acquired, acquired], vec![]);
        let (f0, f1) = (p.sync.slot(0).in_flight, p.sync.slot(1).in_flight);

        let frame = ready(&mut p);
        assert_eq!(take(&log), vec![Call::WaitFence(f0), Call::Acquire]);
        p.submit_frame(frame).unwrap();
        take(&log);

        // Slot 1 gets image 0 back while slot 0's submission may still use it.
        let frame = ready(&mut p);
        assert_eq!(frame.slot, 1);
        assert_eq!(
            take(&log),
            vec![Call::WaitFence(f1), Call::Acquire, Call::WaitFence(f0)]
        );
        assert_eq!(p.images_in_flight[0], Some(f1));
    }

    #[test]
    fn image_index_past_the_swapchain_is_an_error() {
        let (mut p, _log) = presenter(
            vec![AcquireOutcome::Acquired {
                index: 7,
                suboptimal: false,
            }],
            vec![],
        );
        assert!(p.prepare_frame().is_err());
    }

    #[test]
    fn frame_without_views_is_rejected() {
        let (mut p, log) = presenter(vec![], vec![]);
        assert!(p.submit_frame(Frame::default()).is_err());
        assert!(take(&log).is_empty());
    }

    #[test]
    fn frames_in_flight_never_exceed_images() {
        assert_eq!(clamp_frames_in_flight(2, 3), 2);
        assert_eq!(clamp_frames_in_flight(4, 3), 3);
        assert_eq!(clamp_frames_in_flight(0, 3), 1);
        assert_eq!(clamp_frames_in_flight(2, 0), 1);
    }

    #[test]
    fn default_options() {
        let o = SurfaceOptions::default();
        assert_eq!(o.size, RenderSize::new(1280, 720));
        assert!(o.vsync);
        assert_eq!(o.frames_in_flight, 2);
        assert!(o.wait_queue_idle);
    }
}
