// SPDX-License-Identifier: CEPL-1.0
//! OpenXR presentation: runtime bootstrap, the per-frame driver and the
//! [`prism_render::Presenter`] built on them.
#![deny(unsafe_op_in_unsafe_fn)]

mod driver;
mod error;
mod instance;
mod presenter;
mod runtime;
mod session;

pub use driver::{FrameDriver, XrFrame, FAR_PLANE, NEAR_PLANE};
pub use error::{XrError, XrResult};
pub use instance::{
    api_version_supported, require_stereo_view_count, require_view_configuration,
    split_extension_list, BindingMode, XrInstance, XrOptions, BLEND_MODE, STEREO_VIEWS,
    VIEW_CONFIGURATION, VULKAN_TARGET,
};
pub use presenter::XrPresenter;
pub use runtime::{FrameTiming, LocatedView, RuntimeEvent, SessionState, XrRuntime};
pub use session::{
    fov_from_xr, fov_to_xr, pose_from_xr, pose_to_xr, session_state, OpenXrRuntime, XrSwapchain,
};

pub use openxr;
