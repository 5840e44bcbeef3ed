//! Presentation errors

use std::fmt;

use thiserror::Error;

use crate::regen::RegenError;
use crate::render::vulkan::VulkanError;

/// Blocking point that exceeded the configured fence timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStage {
    /// Waiting for the current frame slot to retire
    FrameSlot,
    /// Waiting for an older frame still rendering into the acquired image
    SwapchainImage,
}

impl fmt::Display for WaitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameSlot => f.write_str("frame slot fence"),
            Self::SwapchainImage => f.write_str("swapchain image fence"),
        }
    }
}

/// Errors that end the frame loop
///
/// Out-of-date and suboptimal swapchains never show up here; they are handled
/// by regeneration inside the driver.
#[derive(Error, Debug)]
pub enum PresentError {
    /// A device call failed
    #[error("GPU error: {0}")]
    Gpu(#[from] VulkanError),

    /// A bounded fence wait elapsed
    #[error("Timed out waiting on the {stage}")]
    Timeout {
        /// Which wait timed out
        stage: WaitStage,
    },

    /// Rebuilding the swapchain chain failed
    #[error("Swapchain regeneration failed: {0}")]
    Regeneration(#[from] RegenError),

    /// The before-submit hook reported an error
    #[error("Before-submit hook failed: {0}")]
    Hook(String),

    /// The acquired image has no matching per-image state
    #[error("Image index {index} out of range for {count} swapchain image(s)")]
    ImageOutOfRange {
        /// Index returned by acquisition
        index: u32,
        /// Current image count
        count: usize,
    },

    /// Driver construction parameters were rejected
    #[error("Invalid presentation config: {0}")]
    Config(String),

    /// A previous frame failed; the driver no longer draws
    #[error("Presentation driver is faulted by an earlier error")]
    Faulted,
}

/// Result type for presentation operations
pub type PresentResult<T> = Result<T, PresentError>;
