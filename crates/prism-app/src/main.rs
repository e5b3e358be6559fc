// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use prism_core::init_tracing;
use prism_platform::{spawn_keyboard_watcher, ShutdownSignal};
use prism_render::{Presenter, RenderSize};
use prism_xr::XrPresenter;
use tracing::{error, info, warn};

use prism_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

mod backend;
mod config;
mod recorder;

use backend::{create_surface_presenter, try_xr, ActivePresenter, FrameLoop, Tick};
use config::{AppCfg, Args};

/// How long a stopping XR session gets to reach its final state.
const EXIT_BUDGET: Duration = Duration::from_secs(2);

struct App {
    cfg: AppCfg,
    shutdown: ShutdownSignal,
    window: Option<Window>,
    presenter: Option<ActivePresenter>,
    frame_loop: FrameLoop,
    exiting: bool,
    paused: bool,
    /// First fatal error; reported by `main` once the event loop returns.
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg, shutdown: ShutdownSignal) -> Self {
        Self {
            cfg,
            shutdown,
            window: None,
            presenter: None,
            frame_loop: FrameLoop::new(),
            exiting: false,
            paused: false,
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("prism")
            .with_inner_size(PhysicalSize::new(self.cfg.window.width, self.cfg.window.height));
        let window = event_loop.create_window(attrs).context("creating window")?;
        let presenter = create_surface_presenter(&window, &self.cfg)?;
        info!(
            "window presenter ready: {:?} {:?}",
            presenter.current_extent(),
            presenter.current_color_format()
        );
        let size = window.inner_size();
        self.paused = RenderSize::new(size.width, size.height).is_empty();
        self.presenter = Some(ActivePresenter::Surface(Box::new(presenter)));
        self.window = Some(window);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        if self.failure.is_none() {
            self.failure = Some(e);
        }
        self.shut_down(event_loop);
    }

    /// Presenter before window: the surface must die first.
    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.presenter = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, e.context("window presentation init"));
                return;
            }
        }

        event_loop.set_control_flow(if self.cfg.window.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        info!("resumed → paused={}", self.paused);

        if !self.paused {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shut_down(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize::new(new_size.width, new_size.height);
                self.paused = size.is_empty();
                info!("Resized → {}x{} (paused={})", size.width, size.height, self.paused);
                if let Some(presenter) = &mut self.presenter {
                    presenter.resize(size);
                }
                if !self.paused {
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                let Some(presenter) = &mut self.presenter else {
                    return;
                };
                match self.frame_loop.tick(presenter) {
                    Ok(Tick::Exit) => self.shut_down(event_loop),
                    Ok(_) => {}
                    Err(e) => self.fail(event_loop, e.context("rendering frame")),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if self.shutdown.is_triggered() {
            info!("shutdown signal received");
            self.shut_down(event_loop);
            return;
        }
        if self.paused {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn run_window(cfg: AppCfg, shutdown: ShutdownSignal) -> Result<()> {
    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, shutdown);
    event_loop.run_app(&mut app)?;
    info!("rendered {} frames", app.frame_loop.rendered());
    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// No window here: poll the shutdown flag between frames and stop when the
/// session does.
fn run_xr(presenter: XrPresenter, shutdown: ShutdownSignal) -> Result<()> {
    let mut presenter = ActivePresenter::Xr(Box::new(presenter));
    let mut frame_loop = FrameLoop::new();
    info!("press Enter to end the XR session");

    loop {
        if shutdown.is_triggered() {
            info!("shutdown signal received, ending XR session");
            presenter.request_exit();
            if !frame_loop.drain(&mut presenter, EXIT_BUDGET)? {
                warn!("XR session did not stop within {EXIT_BUDGET:?}");
            }
            break;
        }
        if frame_loop.tick(&mut presenter)? == Tick::Exit {
            info!("XR session ended");
            break;
        }
    }
    info!(
        "{} presenter rendered {} frames",
        presenter.kind(),
        frame_loop.rendered()
    );
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let cfg = config::resolve(&args);
    info!(
        "config: {}x{} vsync={} xr={} legacy={} validation={} frames_in_flight={}",
        cfg.window.width,
        cfg.window.height,
        cfg.window.vsync,
        cfg.xr.enabled,
        cfg.xr.legacy_binding,
        cfg.gpu.validation,
        cfg.gpu.frames_in_flight
    );

    let shutdown = ShutdownSignal::new();
    if let Err(e) = spawn_keyboard_watcher(shutdown.clone()) {
        warn!("keyboard shutdown watcher unavailable: {e}");
    }

    match try_xr(&cfg) {
        Some(presenter) => run_xr(presenter, shutdown),
        None => run_window(cfg, shutdown),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            for cause in e.chain().skip(1) {
                error!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}
