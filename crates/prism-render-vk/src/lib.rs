// SPDX-License-Identifier: CEPL-1.0
//! Vulkan presentation core: device, frame synchronization, window swapchain,
//! render targets and the conventional [`prism_render::Presenter`].
#![deny(unsafe_op_in_unsafe_fn)]

mod device;
mod error;
mod instance;
mod present;
mod swapchain;
mod sync;
mod targets;

pub use device::{
    check_upload_size, describe_physical_devices, find_memory_type, pick_physical_device, resolve_queue_family,
    score_device, select_device, AllocatedBuffer, Device, DeviceCandidate, DeviceRequest,
    QueueFamilyIndices, DEFAULT_FENCE_TIMEOUT,
};
pub use error::{VkError, VkResult};
pub use instance::{InstanceConfig, VkContext};
pub use present::{
    clamp_frames_in_flight, CommandRecorder, Frame, SurfaceGpu, SurfaceOptions, SurfacePresenter,
    ViewTarget, VkSurface,
};
pub use swapchain::{
    choose_color_format, choose_composite_alpha, choose_extent, choose_image_count,
    choose_image_usage, choose_pre_transform, choose_present_mode, choose_surface_format,
    create_color_view, graphics_present_family, require_present_on, surface_queue_family,
    AcquireOutcome, PresentOutcome, Swapchain, SwapchainState, PREFERRED_FORMAT,
};
pub use sync::{FrameSlot, FrameSyncSet, SyncDevice};
pub use targets::{create_render_pass, DepthBuffer, RenderTargets, TargetBackend, VkTargets};

pub use ash;
