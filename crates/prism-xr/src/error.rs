// SPDX-License-Identifier: CEPL-1.0
use openxr as xr;
use prism_render_vk::VkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrError {
    #[error("failed to load the OpenXR loader: {0}")]
    Loader(String),

    #[error("{call} failed: {result:?} ({})", .result.into_raw())]
    Call {
        call: &'static str,
        result: xr::sys::Result,
    },

    #[error("runtime does not offer {0}")]
    MissingExtension(&'static str),

    #[error("runtime has no {0:?} reference space")]
    MissingReferenceSpace(xr::ReferenceSpaceType),

    #[error("system does not support the {0:?} view configuration")]
    MissingViewConfiguration(xr::ViewConfigurationType),

    #[error("end_frame called without a frame in progress")]
    NoFrameInProgress,

    #[error("begin_frame called while a frame is still in progress")]
    FrameInProgress,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Vk(#[from] VkError),
}

impl XrError {
    pub fn call(call: &'static str) -> impl FnOnce(xr::sys::Result) -> XrError {
        move |result| XrError::Call { call, result }
    }

    /// Loss of the session or instance ends the run; everything else here
    /// is a setup or protocol failure and also fatal, except errors the
    /// Vulkan side classifies as recoverable.
    pub fn is_fatal(&self) -> bool {
        match self {
            XrError::Vk(e) => e.is_fatal(),
            _ => true,
        }
    }
}

pub type XrResult<T> = std::result::Result<T, XrError>;
