//! Frame slot synchronization
//!
//! Each slot carries the two semaphores and the fence one frame needs. Slots are
//! created once and survive every swapchain regeneration; only the image→fence
//! map is rebuilt when the image count changes.

use ash::vk;

use super::interfaces::GpuQueue;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Synchronization objects of one frame in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Signalled by acquisition, waited on by submission
    pub image_available: vk::Semaphore,
    /// Signalled by submission, waited on by present
    pub render_finished: vk::Semaphore,
    /// Signalled when the slot's submission retires
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    fn new<G: GpuQueue>(gpu: &G, created: &mut Vec<Self>) -> VulkanResult<Self> {
        let image_available = gpu.create_semaphore()?;
        let render_finished = match gpu.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(e) => {
                gpu.destroy_semaphore(image_available);
                return Err(e);
            }
        };
        // Signalled so the first wait on each slot returns immediately
        let in_flight = match gpu.create_fence(true) {
            Ok(fence) => fence,
            Err(e) => {
                gpu.destroy_semaphore(render_finished);
                gpu.destroy_semaphore(image_available);
                return Err(e);
            }
        };

        let slot = Self {
            image_available,
            render_finished,
            in_flight,
        };
        created.push(slot);
        Ok(slot)
    }

    fn destroy<G: GpuQueue>(self, gpu: &G) {
        gpu.destroy_fence(self.in_flight);
        gpu.destroy_semaphore(self.render_finished);
        gpu.destroy_semaphore(self.image_available);
    }
}

/// Which slot fence last used each swapchain image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainImageState {
    fences: Vec<Option<vk::Fence>>,
}

impl SwapchainImageState {
    /// Map for `image_count` images, none in use
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    /// Forget every association and resize for a new swapchain
    pub fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, None);
    }

    /// Fence of the frame that last used `image_index`
    pub fn fence(&self, image_index: u32) -> Option<vk::Fence> {
        self.fences.get(image_index as usize).copied().flatten()
    }

    /// Associate an image with a slot fence, returning the previous fence
    ///
    /// Returns `None` for out-of-range indices without recording anything.
    pub fn assign(&mut self, image_index: u32, fence: vk::Fence) -> Option<vk::Fence> {
        self.fences
            .get_mut(image_index as usize)
            .and_then(|entry| entry.replace(fence))
    }

    /// Whether `image_index` addresses an image of the current swapchain
    pub fn contains(&self, image_index: u32) -> bool {
        (image_index as usize) < self.fences.len()
    }

    /// Number of swapchain images tracked
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether no images are tracked
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

/// Ring of frame slots plus the per-image fence map
pub struct FrameSynchronizer {
    slots: Vec<FrameSlot>,
    images: SwapchainImageState,
    current: usize,
}

impl FrameSynchronizer {
    /// Create `frames_in_flight` slots for a swapchain of `image_count` images
    ///
    /// On failure every object created so far is destroyed again.
    pub fn new<G: GpuQueue>(
        gpu: &G,
        frames_in_flight: usize,
        image_count: usize,
    ) -> VulkanResult<Self> {
        if frames_in_flight == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "at least one frame slot is required".to_string(),
            });
        }

        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            if let Err(e) = FrameSlot::new(gpu, &mut slots) {
                for slot in slots {
                    slot.destroy(gpu);
                }
                return Err(e);
            }
        }

        log::debug!(
            "Created {} frame slot(s) for {} swapchain image(s)",
            frames_in_flight,
            image_count
        );

        Ok(Self {
            slots,
            images: SwapchainImageState::new(image_count),
            current: 0,
        })
    }

    /// Number of frame slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot the next frame uses
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Slot the next frame uses
    pub fn current_slot(&self) -> FrameSlot {
        self.slots[self.current]
    }

    /// All slots, in ring order
    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    /// Move to the next slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Per-image fence map
    pub const fn images(&self) -> &SwapchainImageState {
        &self.images
    }

    /// Per-image fence map, mutable
    pub fn images_mut(&mut self) -> &mut SwapchainImageState {
        &mut self.images
    }

    /// Drop every image association after a swapchain rebuild
    pub fn reset_images(&mut self, image_count: usize) {
        self.images.reset(image_count);
    }

    /// Wait for the device to go idle, then destroy every slot
    ///
    /// Idempotent: a second call finds no slots left.
    pub fn destroy<G: GpuQueue>(&mut self, gpu: &G) -> VulkanResult<()> {
        if self.slots.is_empty() {
            return Ok(());
        }

        gpu.wait_idle()?;
        for slot in self.slots.drain(..) {
            slot.destroy(gpu);
        }
        self.images.reset(0);
        self.current = 0;
        Ok(())
    }
}
