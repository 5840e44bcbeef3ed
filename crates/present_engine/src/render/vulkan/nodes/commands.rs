//! Command pool and the per-image command buffers

use ash::vk;

use super::{required, ChainState};
use crate::regen::Regenerable;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// One primary command buffer per swapchain image, recorded on creation
#[derive(Debug, Default)]
pub struct CommandBuffersNode {
    pool: vk::CommandPool,
}

impl CommandBuffersNode {
    fn release(&mut self, ctx: &mut ChainState) {
        ctx.command_buffers.clear();
        if self.pool != vk::CommandPool::null() {
            // Frees the buffers allocated from it
            unsafe { ctx.device.destroy_command_pool(self.pool, None) };
        }
        self.pool = vk::CommandPool::null();
    }

    fn allocate(&mut self, ctx: &mut ChainState, count: u32) -> VulkanResult<()> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(ctx.graphics_family);
        self.pool = unsafe {
            ctx.device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        ctx.command_buffers = unsafe {
            ctx.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        ctx.record_all()
    }
}

impl Regenerable<ChainState> for CommandBuffersNode {
    fn label(&self) -> &'static str {
        "command-buffers"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let count = ctx.framebuffers.len();
        required(ctx.swapchain.as_ref(), "swapchain")?;
        if count == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "framebuffers are not available".to_string(),
            });
        }
        let count = u32::try_from(count).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("{count} framebuffers"),
        })?;

        if let Err(e) = self.allocate(ctx, count) {
            self.release(ctx);
            return Err(e);
        }
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        self.release(ctx);
    }
}
