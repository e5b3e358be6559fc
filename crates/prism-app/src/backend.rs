// SPDX-License-Identifier: CEPL-1.0
//! Presenter selection and the per-tick frame protocol shared by both loops.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use prism_core::FpsCounter;
use prism_platform::winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use prism_platform::winit::window::Window;
use prism_render::{FrameStatus, Presenter, RenderSize};
use prism_render_vk::ash::vk;
use prism_render_vk::{
    pick_physical_device, surface_queue_family, Device, DeviceRequest, Frame, InstanceConfig,
    SurfaceOptions, SurfacePresenter, VkContext,
};
use prism_xr::{BindingMode, XrInstance, XrOptions, XrPresenter};
use tracing::{debug, info, warn};

use crate::config::AppCfg;
use crate::recorder::ClearRecorder;

const APP_NAME: &str = "prism";

pub enum ActivePresenter {
    Surface(Box<SurfacePresenter>),
    Xr(Box<XrPresenter>),
}

impl ActivePresenter {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivePresenter::Surface(_) => "window",
            ActivePresenter::Xr(_) => "xr",
        }
    }
}

impl Presenter for ActivePresenter {
    type Frame = Frame;
    type Format = vk::Format;

    fn prepare_frame(&mut self) -> Result<FrameStatus<Frame>> {
        match self {
            ActivePresenter::Surface(p) => p.prepare_frame(),
            ActivePresenter::Xr(p) => p.prepare_frame(),
        }
    }

    fn submit_frame(&mut self, frame: Frame) -> Result<()> {
        match self {
            ActivePresenter::Surface(p) => p.submit_frame(frame),
            ActivePresenter::Xr(p) => p.submit_frame(frame),
        }
    }

    fn current_extent(&self) -> RenderSize {
        match self {
            ActivePresenter::Surface(p) => p.current_extent(),
            ActivePresenter::Xr(p) => p.current_extent(),
        }
    }

    fn current_color_format(&self) -> vk::Format {
        match self {
            ActivePresenter::Surface(p) => p.current_color_format(),
            ActivePresenter::Xr(p) => p.current_color_format(),
        }
    }

    fn resize(&mut self, size: RenderSize) {
        match self {
            ActivePresenter::Surface(p) => p.resize(size),
            ActivePresenter::Xr(p) => p.resize(size),
        }
    }

    fn request_exit(&mut self) {
        match self {
            ActivePresenter::Surface(p) => p.request_exit(),
            ActivePresenter::Xr(p) => p.request_exit(),
        }
    }
}

/// Result of one [`FrameLoop::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Rendered,
    Skipped,
    Exit,
}

/// Drives prepare/submit once per tick and logs the frame rate.
pub struct FrameLoop {
    fps: FpsCounter,
    rendered: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            fps: FpsCounter::new(Instant::now()),
            rendered: 0,
        }
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn tick<P: Presenter>(&mut self, presenter: &mut P) -> Result<Tick> {
        let tick = match presenter.prepare_frame()? {
            FrameStatus::Ready(frame) => {
                presenter.submit_frame(frame)?;
                self.rendered += 1;
                Tick::Rendered
            }
            FrameStatus::Skipped => {
                debug!("frame skipped");
                Tick::Skipped
            }
            FrameStatus::Exit => return Ok(Tick::Exit),
        };
        let now = Instant::now();
        let closed = match tick {
            Tick::Rendered => self.fps.frame(now),
            _ => self.fps.poll(now),
        };
        if let Some(fps) = closed {
            info!("fps ~ {fps}");
        }
        Ok(tick)
    }

    /// After an exit request: keep ticking until the backend reports `Exit`
    /// or `budget` runs out.
    pub fn drain<P: Presenter>(&mut self, presenter: &mut P, budget: Duration) -> Result<bool> {
        let deadline = Instant::now() + budget;
        while Instant::now() < deadline {
            if self.tick(presenter)? == Tick::Exit {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Any failure here sends the caller back to window presentation.
pub fn create_xr_presenter(cfg: &AppCfg) -> Result<XrPresenter> {
    let options = XrOptions {
        app_name: APP_NAME.into(),
        binding: if cfg.xr.legacy_binding {
            BindingMode::Legacy
        } else {
            BindingMode::Modern
        },
        validation: cfg.gpu.validation,
    };
    let instance = XrInstance::create(options).context("creating XR instance")?;
    XrPresenter::new(instance, Box::new(ClearRecorder::default())).context("starting XR session")
}

pub fn create_surface_presenter(window: &Window, cfg: &AppCfg) -> Result<SurfacePresenter> {
    let display = window.display_handle()?.as_raw();
    let handle = window.window_handle()?.as_raw();

    let mut config = InstanceConfig::new(APP_NAME).with_surface_extensions(display)?;
    config.validation = cfg.gpu.validation;
    let context = VkContext::new(VkContext::load_entry()?, config)?;
    let surface = context.create_surface(display, handle)?;

    let device = match surface_device(&context, surface) {
        Ok(device) => device,
        Err(e) => {
            // SAFETY: nothing else references the surface yet.
            unsafe { context.surface_loader().destroy_surface(surface, None) };
            return Err(e);
        }
    };

    let size = window.inner_size();
    let options = SurfaceOptions {
        size: RenderSize::new(size.width, size.height),
        vsync: cfg.window.vsync,
        frames_in_flight: cfg.gpu.frames_in_flight,
        wait_queue_idle: cfg.gpu.wait_queue_idle,
    };
    SurfacePresenter::new(
        context,
        device,
        surface,
        options,
        Box::new(ClearRecorder::default()),
    )
}

fn surface_device(context: &VkContext, surface: vk::SurfaceKHR) -> Result<Device> {
    let physical = pick_physical_device(
        context.instance(),
        Some((context.surface_loader(), surface)),
    )?;
    let family = surface_queue_family(context, physical, surface)?;
    let request = DeviceRequest {
        graphics_family: Some(family),
        ..Default::default()
    };
    Ok(Device::new(context.instance(), physical, &request)?)
}

/// XR is tried first when enabled; failure degrades to the window path.
pub fn try_xr(cfg: &AppCfg) -> Option<XrPresenter> {
    if !cfg.xr.enabled {
        return None;
    }
    match create_xr_presenter(cfg) {
        Ok(p) => {
            info!("presenting through the XR runtime");
            Some(p)
        }
        Err(e) => {
            warn!("XR unavailable, falling back to window: {e:#}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        script: VecDeque<FrameStatus<u32>>,
        submitted: Vec<u32>,
        exit_requested: bool,
    }

    impl Presenter for Scripted {
        type Frame = u32;
        type Format = u32;

        fn prepare_frame(&mut self) -> Result<FrameStatus<u32>> {
            Ok(self.script.pop_front().unwrap_or(FrameStatus::Skipped))
        }

        fn submit_frame(&mut self, frame: u32) -> Result<()> {
            self.submitted.push(frame);
            Ok(())
        }

        fn current_extent(&self) -> RenderSize {
            RenderSize::new(1, 1)
        }

        fn current_color_format(&self) -> u32 {
            0
        }

        fn request_exit(&mut self) {
            self.exit_requested = true;
            self.script.push_back(FrameStatus::Exit);
        }
    }

    #[test]
    fn ready_frames_are_submitted() {
        let mut p = Scripted {
            script: VecDeque::from([FrameStatus::Ready(7), FrameStatus::Skipped]),
            ..Default::default()
        };
        let mut lp = FrameLoop::new();
        assert_eq!(lp.tick(&mut p).unwrap(), Tick::Rendered);
        assert_eq!(lp.tick(&mut p).unwrap(), Tick::Skipped);
        assert_eq!(p.submitted, vec![7]);
        assert_eq!(lp.rendered(), 1);
    }

    #[test]
    fn drain_stops_at_exit() {
        let mut p = Scripted {
            script: VecDeque::from([FrameStatus::Ready(1), FrameStatus::Ready(2)]),
            ..Default::default()
        };
        p.request_exit();
        let mut lp = FrameLoop::new();
        assert!(lp.drain(&mut p, Duration::from_secs(5)).unwrap());
        assert_eq!(p.submitted, vec![1, 2]);
        assert!(p.exit_requested);
    }

    #[test]
    fn drain_gives_up_after_budget() {
        let mut p = Scripted::default();
        let mut lp = FrameLoop::new();
        assert!(!lp.drain(&mut p, Duration::from_millis(20)).unwrap());
    }

    #[test]
    fn xr_disabled_never_touches_runtime() {
        assert!(try_xr(&AppCfg::default()).is_none());
    }
}
