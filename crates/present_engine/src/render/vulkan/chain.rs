//! The swapchain chain: every resource rebuilt when the surface changes
//!
//! Owns a [`RegenerationGraph`] over [`ChainState`] rooted at the surface
//! probe, and serves it to the presentation driver as a
//! [`PresentationTarget`].

use std::fs::File;
use std::path::Path;

use ash::vk;

use super::context::VulkanContext;
use super::nodes::{
    ChainState, CommandBuffersNode, DescriptorSetsNode, FramebuffersNode, PipelineNode,
    RenderPassNode, SurfaceProbeNode, SwapchainNode,
};
use super::vertex::MvpUniform;
use super::{CommandRecorder, VulkanError, VulkanResult};
use crate::core::config::PresentConfig;
use crate::frame::PresentationTarget;
use crate::regen::{NodeId, RegenError, RegenResult, RegenerationGraph};

fn read_spirv(path: &str) -> VulkanResult<Vec<u32>> {
    let mut file = File::open(Path::new(path)).map_err(|e| {
        VulkanError::InitializationFailed(format!("Failed to open shader {path}: {e}"))
    })?;
    ash::util::read_spv(&mut file)
        .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V in {path}: {e}")))
}

/// Swapchain-dependent resources of one window
///
/// Must be dropped before the [`VulkanContext`] it was built from.
pub struct SwapchainChain {
    graph: RegenerationGraph<ChainState>,
    state: ChainState,
    root: Option<NodeId>,
}

impl SwapchainChain {
    /// Build every node for a window whose framebuffer is `framebuffer_extent`
    pub fn new(
        context: &VulkanContext,
        config: &PresentConfig,
        framebuffer_extent: vk::Extent2D,
    ) -> RegenResult<Self> {
        let vertex_shader = read_spirv(&config.shaders.vertex_shader_path)?;
        let fragment_shader = read_spirv(&config.shaders.fragment_shader_path)?;

        let device = context.device().clone();
        let ubo_binding = vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .build();
        let bindings = [ubo_binding];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let descriptor_set_layout = unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let state = ChainState {
            device,
            instance: context.instance().clone(),
            physical_device: context.physical_device().handle,
            surface: context.surface(),
            surface_loader: context.surface_loader().clone(),
            swapchain_loader: context.swapchain_loader().clone(),
            graphics_family: context.queue_families().graphics,
            preferred_present_mode: config.preferred_present_mode.to_vk(),
            descriptor_set_layout,
            descriptor_types: bindings.iter().map(|b| b.descriptor_type).collect(),
            uniform_size: MvpUniform::SIZE,
            vertex_shader,
            fragment_shader,
            recorder: None,
            framebuffer_extent,
            support: None,
            swapchain: None,
            render_pass: None,
            framebuffers: Vec::new(),
            uniform_buffers: Vec::new(),
            descriptor_sets: Vec::new(),
            pipeline: None,
            command_buffers: Vec::new(),
        };

        // Built in place so a failing node still gets the Drop teardown
        let mut chain = Self {
            graph: RegenerationGraph::new(),
            state,
            root: None,
        };
        chain.build()?;

        log::info!(
            "Swapchain chain ready: {} nodes, {} images at {}x{}",
            chain.graph.len(),
            chain.image_count(),
            chain.extent().width,
            chain.extent().height
        );
        Ok(chain)
    }

    fn build(&mut self) -> RegenResult<()> {
        let graph = &mut self.graph;
        let state = &mut self.state;

        let probe = graph.add_root(SurfaceProbeNode, state)?;
        self.root = Some(probe);

        // Command buffers bind the pipeline and descriptor sets, so both sit on
        // their ancestor path and any rebuild above them re-records
        let swapchain = graph.add_node(probe, SwapchainNode::default(), state)?;
        let render_pass = graph.add_node(swapchain, RenderPassNode::default(), state)?;
        let descriptors = graph.add_node(render_pass, DescriptorSetsNode::default(), state)?;
        let pipeline = graph.add_node(descriptors, PipelineNode::default(), state)?;
        let framebuffers = graph.add_node(pipeline, FramebuffersNode::default(), state)?;
        graph.add_node(framebuffers, CommandBuffersNode::default(), state)?;
        Ok(())
    }

    /// Bind the command recorder and re-record every image's buffer
    ///
    /// The recorder stays bound and runs again after each regeneration.
    pub fn record<R: CommandRecorder + 'static>(&mut self, recorder: R) -> VulkanResult<()> {
        unsafe { self.state.device.device_wait_idle().map_err(VulkanError::Api)? };
        self.state.recorder = Some(Box::new(recorder));
        self.state.record_all()
    }

    /// Copy `value` into the uniform buffer read by `image_index`
    ///
    /// Only safe for an image whose previous submission has completed, which
    /// is what the before-submit hook guarantees.
    pub fn write_uniform<T: bytemuck::Pod>(&self, image_index: u32, value: &T) -> VulkanResult<()> {
        self.state
            .uniform_buffers
            .get(image_index as usize)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no uniform buffer for image {image_index}"),
            })?
            .write(value)
    }

    /// Current swapchain extent, zero when no swapchain is live
    pub fn extent(&self) -> vk::Extent2D {
        self.state
            .swapchain()
            .map_or_else(vk::Extent2D::default, |swapchain| swapchain.extent)
    }

    /// Current swapchain image format
    pub fn format(&self) -> Option<vk::SurfaceFormatKHR> {
        self.state.swapchain().map(|swapchain| swapchain.format)
    }

    /// Completed regeneration passes
    pub const fn regeneration_count(&self) -> u64 {
        self.graph.pass_count()
    }

    /// Node labels in creation order
    pub fn node_labels(&self) -> Vec<&'static str> {
        self.root
            .and_then(|root| self.graph.chain(root).ok())
            .map(|chain| {
                chain
                    .creation_order()
                    .filter_map(|id| self.graph.label(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PresentationTarget for SwapchainChain {
    fn swapchain(&self) -> vk::SwapchainKHR {
        self.state
            .swapchain()
            .map_or_else(vk::SwapchainKHR::null, |swapchain| swapchain.handle)
    }

    fn image_count(&self) -> usize {
        self.state
            .swapchain()
            .map_or(0, |swapchain| swapchain.images.len())
    }

    fn command_buffer(&self, image_index: u32) -> Option<vk::CommandBuffer> {
        self.state.command_buffers.get(image_index as usize).copied()
    }

    fn regenerate(&mut self, framebuffer_extent: vk::Extent2D) -> RegenResult<()> {
        let root = self.root.ok_or(RegenError::NotLive {
            label: "surface-capabilities",
        })?;

        self.state.framebuffer_extent = framebuffer_extent;
        let chain = self.graph.regenerate(root, &mut self.state)?;

        let extent = self.extent();
        log::info!(
            "Regenerated {} node(s): {} images at {}x{}",
            chain.len(),
            self.image_count(),
            extent.width,
            extent.height
        );
        Ok(())
    }
}

impl Drop for SwapchainChain {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.state.device.device_wait_idle() {
                log::warn!("Device wait failed before chain teardown: {e:?}");
            }
        }
        self.graph.teardown(&mut self.state);
        self.state.recorder = None;
        unsafe {
            self.state
                .device
                .destroy_descriptor_set_layout(self.state.descriptor_set_layout, None);
        }
        log::debug!("Swapchain chain destroyed");
    }
}
