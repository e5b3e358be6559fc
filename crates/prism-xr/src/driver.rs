// SPDX-License-Identifier: CEPL-1.0
//! Per-frame XR protocol.
//!
//! Session events are drained before anything else. Frames are only waited
//! on, begun and ended while the session is running and visible; a stop or
//! loss ends the loop for good.

use prism_math::{projection_from_fov, view_from_pose, EyeMatrices, Pose};
use tracing::{debug, info, warn};

use crate::error::{XrError, XrResult};
use crate::runtime::{FrameTiming, LocatedView, RuntimeEvent, SessionState, XrRuntime};

pub const NEAR_PLANE: f32 = 0.05;
pub const FAR_PLANE: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XrFrame {
    /// Views are located, the frame is begun and one image per view is
    /// acquired. Must be followed by [`FrameDriver::end_frame`].
    Render { display_time: i64 },
    /// Nothing to do this tick.
    Skipped,
    /// The session stopped or was lost.
    Ended,
}

pub struct FrameDriver<R: XrRuntime> {
    runtime: R,
    state: SessionState,
    running: bool,
    visible: bool,
    ended: bool,
    session_begun: bool,
    // Sized once to the view count and reused every frame.
    views: Vec<LocatedView>,
    eyes: Vec<EyeMatrices>,
    images: Vec<u32>,
    head: Pose,
    in_progress: Option<FrameTiming>,
}

impl<R: XrRuntime> FrameDriver<R> {
    pub fn new(runtime: R) -> Self {
        let n = runtime.view_count();
        Self {
            runtime,
            state: SessionState::Unknown,
            running: false,
            visible: false,
            ended: false,
            session_begun: false,
            views: vec![LocatedView::default(); n],
            eyes: vec![EyeMatrices::default(); n],
            images: vec![0; n],
            head: Pose::IDENTITY,
            in_progress: None,
        }
    }

    pub fn begin_frame(&mut self) -> XrResult<XrFrame> {
        if self.ended {
            return Ok(XrFrame::Ended);
        }
        if self.in_progress.is_some() {
            return Err(XrError::FrameInProgress);
        }

        // Whatever is still queued after a stop belongs to a session that is
        // over and must not restart it.
        while !self.ended {
            let Some(event) = self.runtime.poll_event()? else {
                break;
            };
            self.handle_event(event)?;
        }
        if self.ended {
            return Ok(XrFrame::Ended);
        }
        if !(self.running && self.visible) {
            return Ok(XrFrame::Skipped);
        }

        let timing = self.runtime.wait_frame()?;
        let time = timing.predicted_display_time;
        if !timing.should_render {
            self.runtime.begin_frame()?;
            self.runtime.end_frame(time, None)?;
            debug!("compositor asked to skip rendering at {time}");
            return Ok(XrFrame::Skipped);
        }

        self.runtime.sync_input()?;
        self.runtime.locate_views(time, &mut self.views)?;
        for (eye, view) in self.eyes.iter_mut().zip(&self.views) {
            *eye = EyeMatrices {
                projection: projection_from_fov(view.fov, NEAR_PLANE, FAR_PLANE),
                view: view_from_pose(view.pose),
            };
        }
        if let Some(head) = self.runtime.locate_head(time)? {
            self.head = head;
        }

        self.runtime.begin_frame()?;
        for (view, image) in self.images.iter_mut().enumerate() {
            *image = self.runtime.acquire_image(view)?;
        }
        self.in_progress = Some(timing);
        Ok(XrFrame::Render { display_time: time })
    }

    /// Releases the views' images and hands one projection layer to the
    /// compositor. A begun frame must always be ended.
    pub fn end_frame(&mut self) -> XrResult<()> {
        let timing = self.in_progress.take().ok_or(XrError::NoFrameInProgress)?;
        for view in 0..self.images.len() {
            self.runtime.release_image(view)?;
        }
        self.runtime
            .end_frame(timing.predicted_display_time, Some(&self.views))
    }

    /// Asks the runtime to stop the session; frames keep flowing until it
    /// reports stopping.
    pub fn request_exit(&mut self) -> XrResult<()> {
        if self.session_begun {
            self.runtime.request_exit()
        } else {
            self.ended = true;
            Ok(())
        }
    }

    fn handle_event(&mut self, event: RuntimeEvent) -> XrResult<()> {
        if self.ended {
            debug!("ignoring {event:?} after session end");
            return Ok(());
        }
        match event {
            RuntimeEvent::SessionStateChanged(state) => {
                info!("XR session state {:?} -> {state:?}", self.state);
                self.state = state;
                self.visible = state <= SessionState::Focused;
                match state {
                    SessionState::Ready if !self.session_begun => {
                        self.runtime.begin_session()?;
                        self.session_begun = true;
                        self.running = true;
                    }
                    SessionState::Stopping if self.session_begun => {
                        self.runtime.end_session()?;
                        self.session_begun = false;
                    }
                    _ => {}
                }
                if state >= SessionState::Stopping {
                    self.stop();
                }
            }
            RuntimeEvent::InstanceLossPending => {
                warn!("XR instance loss pending");
                self.stop();
            }
            RuntimeEvent::Other => {}
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.visible = false;
        self.ended = true;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn frame_in_progress(&self) -> bool {
        self.in_progress.is_some()
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Most recently located head pose.
    pub fn head_pose(&self) -> Pose {
        self.head
    }

    pub fn eye(&self, view: usize) -> Option<EyeMatrices> {
        self.eyes.get(view).copied()
    }

    pub fn located_view(&self, view: usize) -> Option<LocatedView> {
        self.views.get(view).copied()
    }

    pub fn image_index(&self, view: usize) -> Option<u32> {
        self.images.get(view).copied()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }
}
