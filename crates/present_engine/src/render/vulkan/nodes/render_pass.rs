//! Single-subpass colour render pass

use ash::vk;

use super::{required, ChainState};
use crate::regen::Regenerable;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Render pass matching the swapchain image format
#[derive(Debug, Default)]
pub struct RenderPassNode {
    render_pass: vk::RenderPass,
}

impl Regenerable<ChainState> for RenderPassNode {
    fn label(&self) -> &'static str {
        "render-pass"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let format = required(ctx.swapchain.as_ref(), "swapchain")?.format.format;

        let color_attachment = vk::AttachmentDescription::builder()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();
        let attachments = [color_attachment];

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let color_attachments = [color_attachment_ref];

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .build();
        let subpasses = [subpass];

        // The acquire semaphore is waited on at colour output, so the layout
        // transition has to wait there too
        let dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .build();
        let dependencies = [dependency];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        self.render_pass = render_pass;
        ctx.render_pass = Some(render_pass);
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        ctx.render_pass = None;
        unsafe {
            ctx.device.destroy_render_pass(self.render_pass, None);
        }
        self.render_pass = vk::RenderPass::null();
    }
}
