//! Vulkan backend
//!
//! Context objects that live as long as the window, and the swapchain chain
//! whose nodes are rebuilt whenever the surface changes.

pub mod buffer;
pub mod chain;
pub mod commands;
pub mod context;
pub mod device_selection;
pub mod nodes;
pub mod queue;
pub mod swapchain_support;
pub mod vertex;
pub mod window;

pub use buffer::Buffer;
pub use chain::SwapchainChain;
pub use commands::{CommandRecorder, RecordContext};
pub use context::{LogicalDevice, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use device_selection::{DeviceCandidate, QueueFamilies};
pub use queue::VulkanQueue;
pub use swapchain_support::SurfaceSupport;
pub use vertex::{MvpUniform, Vertex};
pub use window::{Window, WindowError, WindowResult};
