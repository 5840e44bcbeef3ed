//! Collaborators of the presentation driver
//!
//! The driver only sees these traits. The Vulkan implementations live in
//! `render::vulkan`; the test suite drives the same code through mocks.

use ash::vk;

use super::error::PresentResult;
use crate::regen::RegenResult;
use crate::render::vulkan::VulkanResult;

/// Result of a fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    /// The fence is signalled
    Signaled,
    /// The timeout elapsed first
    TimedOut,
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; the semaphore will be signalled
    Acquired {
        /// Index of the acquired image
        image_index: u32,
        /// The swapchain still works but no longer matches the surface
        suboptimal: bool,
    },
    /// The swapchain can no longer be used; nothing was signalled
    OutOfDate,
}

/// Result of queueing a present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented against a matching swapchain
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presented; the swapchain must be rebuilt
    OutOfDate,
}

/// Device and queue operations used by the frame loop
///
/// Transient swapchain states are reported through the outcome enums; every
/// `Err` is fatal.
pub trait GpuQueue {
    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;

    /// Create a fence, optionally already signalled
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;

    /// Destroy a semaphore that no pending work references
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Destroy a fence that no pending work references
    fn destroy_fence(&self, fence: vk::Fence);

    /// Block until `fence` is signalled or `timeout_ns` elapses
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VulkanResult<FenceWait>;

    /// Return a signalled fence to the unsignalled state
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Acquire the next presentable image, signalling `signal` when it is ready
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VulkanResult<AcquireOutcome>;

    /// Submit one command buffer
    fn submit(
        &self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VulkanResult<()>;

    /// Queue `image_index` for presentation once `wait` is signalled
    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome>;

    /// Block until the device has no pending work
    fn wait_idle(&self) -> VulkanResult<()>;
}

/// The regenerable resources the driver renders into
pub trait PresentationTarget {
    /// Current swapchain handle
    fn swapchain(&self) -> vk::SwapchainKHR;

    /// Number of images in the current swapchain
    fn image_count(&self) -> usize;

    /// Prerecorded command buffer for an image
    fn command_buffer(&self, image_index: u32) -> Option<vk::CommandBuffer>;

    /// Rebuild every swapchain-dependent resource for a new framebuffer size
    ///
    /// Called only with a non-zero extent and an idle device.
    fn regenerate(&mut self, framebuffer_extent: vk::Extent2D) -> RegenResult<()>;
}

/// Window-system side of presentation
pub trait SurfaceSource {
    /// Drawable size in pixels; zero in either dimension while minimized
    fn framebuffer_size(&self) -> (u32, u32);

    /// Process pending events without blocking
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then process it
    fn wait_events(&mut self);

    /// Read and clear the framebuffer-resized flag
    fn take_resized(&mut self) -> bool;

    /// Whether the user asked to close the window
    fn should_close(&self) -> bool;
}

/// Strategy invoked once per frame, after the image is known to be free and
/// before its command buffer is submitted
///
/// Typical use is writing the per-image uniform buffer.
pub trait BeforeSubmit<T> {
    /// Prepare data consumed by `image_index`'s command buffer
    fn before_submit(&mut self, image_index: u32, target: &mut T) -> PresentResult<()>;
}

impl<T, F> BeforeSubmit<T> for F
where
    F: FnMut(u32, &mut T) -> PresentResult<()>,
{
    fn before_submit(&mut self, image_index: u32, target: &mut T) -> PresentResult<()> {
        self(image_index, target)
    }
}
