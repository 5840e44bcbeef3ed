//! Swapchain-dependent Vulkan resources as regeneration nodes
//!
//! Every node reads its inputs from [`ChainState`] in `create` and publishes
//! its outputs back into it, so children see fresh handles after each pass.
//! The swapchain chain links them into a single path, since the command
//! buffers record against every handle above them:
//!
//! ```text
//! surface-capabilities
//! └── swapchain
//!     └── render-pass
//!         └── descriptor-sets
//!             └── pipeline
//!                 └── framebuffers
//!                     └── command-buffers
//! ```

mod commands;
mod descriptors;
mod framebuffers;
mod pipeline;
mod render_pass;
mod surface;

pub use commands::CommandBuffersNode;
pub use descriptors::{pool_sizes, DescriptorSetsNode};
pub use framebuffers::FramebuffersNode;
pub use pipeline::PipelineNode;
pub use render_pass::RenderPassNode;
pub use surface::{SurfaceProbeNode, SwapchainNode};

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};

use super::buffer::Buffer;
use super::commands::{record_command_buffer, CommandRecorder, RecordContext};
use super::swapchain_support::SurfaceSupport;
use super::{VulkanError, VulkanResult};

/// Swapchain handle and the parameters it was created with
#[derive(Debug, Clone)]
pub struct SwapchainInfo {
    /// Swapchain handle
    pub handle: vk::SwapchainKHR,
    /// Image format and colour space
    pub format: vk::SurfaceFormatKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Images owned by the swapchain
    pub images: Vec<vk::Image>,
}

/// Pipeline handle and its layout
#[derive(Debug, Clone, Copy)]
pub struct PipelineInfo {
    /// Graphics pipeline
    pub pipeline: vk::Pipeline,
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
}

/// Context threaded through every node of the swapchain chain
///
/// The first group of fields never changes after construction. The second is
/// written by nodes as they are created and cleared as they are destroyed.
pub struct ChainState {
    pub(crate) device: Device,
    pub(crate) instance: Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: Surface,
    pub(crate) swapchain_loader: SwapchainLoader,
    pub(crate) graphics_family: u32,
    pub(crate) preferred_present_mode: vk::PresentModeKHR,
    pub(crate) descriptor_set_layout: vk::DescriptorSetLayout,
    pub(crate) descriptor_types: Vec<vk::DescriptorType>,
    pub(crate) uniform_size: vk::DeviceSize,
    pub(crate) vertex_shader: Vec<u32>,
    pub(crate) fragment_shader: Vec<u32>,
    pub(crate) recorder: Option<Box<dyn CommandRecorder>>,

    /// Framebuffer size the next pass is built for
    pub(crate) framebuffer_extent: vk::Extent2D,

    pub(crate) support: Option<SurfaceSupport>,
    pub(crate) swapchain: Option<SwapchainInfo>,
    pub(crate) render_pass: Option<vk::RenderPass>,
    pub(crate) framebuffers: Vec<vk::Framebuffer>,
    pub(crate) uniform_buffers: Vec<Buffer>,
    pub(crate) descriptor_sets: Vec<vk::DescriptorSet>,
    pub(crate) pipeline: Option<PipelineInfo>,
    pub(crate) command_buffers: Vec<vk::CommandBuffer>,
}

/// Read a parent's output, failing if the parent is not live
pub(crate) fn required<T>(value: Option<T>, what: &str) -> VulkanResult<T> {
    value.ok_or_else(|| VulkanError::InvalidOperation {
        reason: format!("{what} is not available"),
    })
}

impl ChainState {
    /// Current swapchain, if live
    pub const fn swapchain(&self) -> Option<&SwapchainInfo> {
        self.swapchain.as_ref()
    }

    /// Record every command buffer with the bound recorder
    ///
    /// The device must be idle, or at least done with every buffer.
    pub(crate) fn record_all(&mut self) -> VulkanResult<()> {
        let swapchain = required(self.swapchain.as_ref(), "swapchain")?;
        let render_pass = required(self.render_pass, "render pass")?;
        let pipeline = required(self.pipeline, "pipeline")?;

        for (index, &command_buffer) in (0u32..).zip(self.command_buffers.iter()) {
            let slot = index as usize;
            let (Some(&framebuffer), Some(&descriptor_set)) =
                (self.framebuffers.get(slot), self.descriptor_sets.get(slot))
            else {
                return Err(VulkanError::InvalidOperation {
                    reason: format!("no framebuffer or descriptor set for image {index}"),
                });
            };

            let ctx = RecordContext {
                device: &self.device,
                command_buffer,
                image_index: index,
                extent: swapchain.extent,
                render_pass,
                framebuffer,
                pipeline: pipeline.pipeline,
                pipeline_layout: pipeline.layout,
                descriptor_set,
            };
            record_command_buffer(&ctx, &mut self.recorder)?;
        }

        log::trace!("Recorded {} command buffer(s)", self.command_buffers.len());
        Ok(())
    }
}
