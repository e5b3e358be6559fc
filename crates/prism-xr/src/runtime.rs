// SPDX-License-Identifier: CEPL-1.0
//! The slice of an XR runtime the frame driver talks to.

use prism_math::{Fov, Pose};

use crate::error::XrResult;

/// Session lifecycle as reported by the runtime. Ordered the way the runtime
/// numbers them, so `state <= Focused` means "not winding down".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeEvent {
    SessionStateChanged(SessionState),
    InstanceLossPending,
    /// Anything the driver does not act on.
    Other,
}

/// Compositor prediction for the frame about to be rendered. Times are in
/// runtime nanoseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    pub predicted_display_time: i64,
    pub predicted_display_period: i64,
    pub should_render: bool,
}

/// Pose and field of view of one view at the predicted display time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocatedView {
    pub pose: Pose,
    pub fov: Fov,
}

/// Runtime calls in the order the driver issues them per frame:
/// `poll_event`* → `wait_frame` → `sync_input` → `locate_views` →
/// `locate_head` → `begin_frame` → `acquire_image`* … `release_image`* →
/// `end_frame`.
pub trait XrRuntime {
    fn view_count(&self) -> usize;

    /// Next queued event, `None` when the queue is empty.
    fn poll_event(&mut self) -> XrResult<Option<RuntimeEvent>>;

    fn begin_session(&mut self) -> XrResult<()>;
    fn end_session(&mut self) -> XrResult<()>;
    fn request_exit(&mut self) -> XrResult<()>;

    /// Blocks until the compositor wants the next frame.
    fn wait_frame(&mut self) -> XrResult<FrameTiming>;
    fn sync_input(&mut self) -> XrResult<()>;
    /// Fills `out`, which holds exactly `view_count()` entries.
    fn locate_views(&mut self, display_time: i64, out: &mut [LocatedView]) -> XrResult<()>;
    /// Head pose in the tracking space, `None` when tracking is lost.
    fn locate_head(&mut self, display_time: i64) -> XrResult<Option<Pose>>;

    fn begin_frame(&mut self) -> XrResult<()>;
    /// Acquires and waits for the next image of `view`'s swapchain.
    fn acquire_image(&mut self, view: usize) -> XrResult<u32>;
    fn release_image(&mut self, view: usize) -> XrResult<()>;
    /// Ends the frame with one projection layer over `views`, or with no
    /// layers at all.
    fn end_frame(&mut self, display_time: i64, views: Option<&[LocatedView]>) -> XrResult<()>;
}
