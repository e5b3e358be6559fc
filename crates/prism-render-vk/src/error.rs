// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VkError {
    #[error("failed to load the Vulkan loader: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("{call} failed: {result:?} ({})", .result.as_raw())]
    Call {
        call: &'static str,
        result: vk::Result,
    },

    #[error("no suitable physical device found")]
    NoSuitableDevice,

    #[error("no queue family supports {0:?}")]
    NoQueueFamily(vk::QueueFlags),

    #[error("no queue family supports both graphics and present")]
    NoPresentQueue,

    #[error("graphics and present are only available on separate queue families")]
    SplitPresentQueue,

    #[error("no memory type in bits {type_bits:#x} has {flags:?}")]
    NoMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    #[error("surface reports no formats")]
    NoSurfaceFormats,

    #[error("{len} bytes of initial data do not fit a {size}-byte buffer")]
    DataTooLarge { len: u64, size: u64 },

    #[error("no supported depth format")]
    NoDepthFormat,

    #[error("window handle unavailable: {0}")]
    Handle(#[from] raw_window_handle::HandleError),

    #[error("swapchain is {0:?}; operation not allowed")]
    InvalidState(crate::SwapchainState),
}

impl VkError {
    pub fn call(call: &'static str) -> impl FnOnce(vk::Result) -> VkError {
        move |result| VkError::Call { call, result }
    }

    /// Whether the run must stop. Out-of-date and suboptimal results are
    /// handled by swapchain recreation and never reach callers as errors.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            VkError::Call {
                result: vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR,
                ..
            } | VkError::InvalidState(_)
        )
    }
}

pub type VkResult<T> = std::result::Result<T, VkError>;
