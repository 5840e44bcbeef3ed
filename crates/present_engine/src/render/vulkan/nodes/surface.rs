//! Surface capabilities and the swapchain built from them

use ash::vk;

use super::{required, ChainState, SwapchainInfo};
use crate::regen::Regenerable;
use crate::render::vulkan::swapchain_support::SurfaceSupport;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Root of the chain: re-queries what the surface supports right now
#[derive(Debug, Default)]
pub struct SurfaceProbeNode;

impl Regenerable<ChainState> for SurfaceProbeNode {
    fn label(&self) -> &'static str {
        "surface-capabilities"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let support = SurfaceSupport::query(&ctx.surface_loader, ctx.physical_device, ctx.surface)?;
        log::trace!(
            "Surface reports extent {}x{}, {} format(s), {} present mode(s)",
            support.capabilities.current_extent.width,
            support.capabilities.current_extent.height,
            support.formats.len(),
            support.present_modes.len()
        );
        ctx.support = Some(support);
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        ctx.support = None;
    }
}

/// Swapchain sized from the probed capabilities and the framebuffer
#[derive(Debug, Default)]
pub struct SwapchainNode {
    swapchain: vk::SwapchainKHR,
}

impl Regenerable<ChainState> for SwapchainNode {
    fn label(&self) -> &'static str {
        "swapchain"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let support = required(ctx.support.as_ref(), "surface capabilities")?;

        let format = support.choose_format()?;
        let present_mode = support.choose_present_mode(ctx.preferred_present_mode);
        let extent = support.choose_extent(ctx.framebuffer_extent);
        let image_count = support.choose_image_count();

        if extent.width == 0 || extent.height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "swapchain extent has zero area".to_string(),
            });
        }

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(ctx.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            ctx.swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let images = match unsafe { ctx.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { ctx.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        log::debug!(
            "Created swapchain {}x{} with {} image(s), {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            format.format,
            present_mode
        );

        self.swapchain = swapchain;
        ctx.swapchain = Some(SwapchainInfo {
            handle: swapchain,
            format,
            extent,
            images,
        });
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        ctx.swapchain = None;
        unsafe {
            ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
    }
}
