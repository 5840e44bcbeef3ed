//! Per-image uniform buffers and their descriptor sets

use ash::{vk, Device};

use super::{required, ChainState};
use crate::regen::Regenerable;
use crate::render::vulkan::buffer::Buffer;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Pool sizes for `set_count` sets of a layout with the given bindings
///
/// Bindings of the same type share one entry, in first-seen order.
pub fn pool_sizes(binding_types: &[vk::DescriptorType], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for &ty in binding_types {
        match sizes.iter_mut().find(|size| size.ty == ty) {
            Some(size) => size.descriptor_count += set_count,
            None => sizes.push(vk::DescriptorPoolSize {
                ty,
                descriptor_count: set_count,
            }),
        }
    }
    sizes
}

/// Descriptor pool sized by image count, with one uniform buffer and one set
/// per image
#[derive(Debug, Default)]
pub struct DescriptorSetsNode {
    pool: vk::DescriptorPool,
}

impl DescriptorSetsNode {
    fn allocate(&mut self, ctx: &mut ChainState, image_count: u32) -> VulkanResult<()> {
        let sizes = pool_sizes(&ctx.descriptor_types, image_count);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(image_count)
            .pool_sizes(&sizes);
        self.pool = unsafe {
            ctx.device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let layouts = vec![ctx.descriptor_set_layout; image_count as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            ctx.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        for &set in &sets {
            let buffer = Buffer::new(
                ctx.device.clone(),
                &ctx.instance,
                ctx.physical_device,
                ctx.uniform_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;

            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: ctx.uniform_size,
            }];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_info)
                .build();
            unsafe { ctx.device.update_descriptor_sets(&[write], &[]) };

            ctx.uniform_buffers.push(buffer);
        }

        ctx.descriptor_sets = sets;
        Ok(())
    }

    fn release(&mut self, ctx: &mut ChainState) {
        ctx.descriptor_sets.clear();
        ctx.uniform_buffers.clear();
        destroy_pool(&ctx.device, self.pool);
        self.pool = vk::DescriptorPool::null();
    }
}

fn destroy_pool(device: &Device, pool: vk::DescriptorPool) {
    if pool != vk::DescriptorPool::null() {
        // Frees every set allocated from it
        unsafe { device.destroy_descriptor_pool(pool, None) };
    }
}

impl Regenerable<ChainState> for DescriptorSetsNode {
    fn label(&self) -> &'static str {
        "descriptor-sets"
    }

    fn create(&mut self, ctx: &mut ChainState) -> VulkanResult<()> {
        let image_count = required(ctx.swapchain.as_ref(), "swapchain")?.images.len();
        let image_count = u32::try_from(image_count).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("{image_count} swapchain images"),
        })?;

        if let Err(e) = self.allocate(ctx, image_count) {
            self.release(ctx);
            return Err(e);
        }

        log::trace!("Allocated {image_count} uniform buffer(s) and descriptor set(s)");
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut ChainState) {
        self.release(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes_scale_with_image_count() {
        let sizes = pool_sizes(&[vk::DescriptorType::UNIFORM_BUFFER], 3);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 3);
    }

    #[test]
    fn test_pool_sizes_keyed_by_type() {
        let sizes = pool_sizes(
            &[
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::UNIFORM_BUFFER,
            ],
            4,
        );

        let counts: Vec<_> = sizes.iter().map(|s| (s.ty, s.descriptor_count)).collect();
        assert_eq!(
            counts,
            vec![
                (vk::DescriptorType::UNIFORM_BUFFER, 8),
                (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4),
            ]
        );
    }

    #[test]
    fn test_pool_sizes_empty_layout() {
        assert!(pool_sizes(&[], 3).is_empty());
    }
}
