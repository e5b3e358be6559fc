// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimised window reports a zero dimension; nothing can be presented.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Outcome of [`Presenter::prepare_frame`].
#[derive(Debug)]
pub enum FrameStatus<F> {
    /// Images are acquired; record/submit work for `F` then call
    /// [`Presenter::submit_frame`].
    Ready(F),
    /// Nothing to render this tick (resize serviced, paused, or the XR
    /// session is not visible). Not an error.
    Skipped,
    /// The presentation backend has shut down; stop the loop.
    Exit,
}

impl<F> FrameStatus<F> {
    pub fn is_ready(&self) -> bool {
        matches!(self, FrameStatus::Ready(_))
    }
}

/// One begin/end frame protocol over whichever backend presents this run.
///
/// Render paths are written once against this trait and never learn whether
/// images come from a window surface or an XR compositor.
pub trait Presenter {
    type Frame;
    type Format: Copy + std::fmt::Debug;

    fn prepare_frame(&mut self) -> Result<FrameStatus<Self::Frame>>;
    fn submit_frame(&mut self, frame: Self::Frame) -> Result<()>;

    /// Extent of the images handed out by `prepare_frame` (per view for XR).
    fn current_extent(&self) -> RenderSize;
    fn current_color_format(&self) -> Self::Format;

    /// Externally observed size change, serviced by the next `prepare_frame`.
    fn resize(&mut self, _size: RenderSize) {}

    /// Asks the backend to wind down; `prepare_frame` eventually returns
    /// [`FrameStatus::Exit`].
    fn request_exit(&mut self) {}
}
