//! Image views and framebuffers, one pair per swapchain image

use ash::{vk, Device};

use super::{required, ChainState};
use crate::regen::Regenerable;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Views onto the swapchain images and the framebuffers wrapping them
#[derive(Debug, Default)]
pub struct FramebuffersNode {
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
}

impl FramebuffersNode {
    fn create_handles(
        &mut self,
        device: &Device,
        render_pass: vk::RenderPass,
        images: &[vk::Image],
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        for &image in images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe {
                device
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)?
            };
            self.image_views.push(view);

            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                device
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(VulkanError::Api)?
            };
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    fn destroy_handles(&mut self, device: &Device) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
    }
}

impl Regenerable<ChainState> for FramebuffersNode {
    fn label(&self) -> &'static str {
        "framebuffers"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let render_pass = required(ctx.render_pass, "render pass")?;
        let swapchain = required(ctx.swapchain.as_ref(), "swapchain")?;

        if let Err(e) = self.create_handles(
            &ctx.device,
            render_pass,
            &swapchain.images,
            swapchain.format.format,
            swapchain.extent,
        ) {
            self.destroy_handles(&ctx.device);
            return Err(e);
        }

        ctx.framebuffers.clone_from(&self.framebuffers);
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        ctx.framebuffers.clear();
        self.destroy_handles(&ctx.device);
    }
}
