//! Mock collaborators for driving the frame loop without a GPU
//!
//! `MockGpu` models fences with pending work: a submission stays outstanding
//! until something waits on its fence or on the whole device. Misuse that the
//! validation layers would flag is reported as an `Err` so tests fail loudly.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::vk::{self, Handle};

use crate::frame::{
    AcquireOutcome, FenceWait, GpuQueue, PresentOutcome, PresentationTarget, SurfaceSource,
};
use crate::regen::{RegenError, RegenResult};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Raw handle base of mock command buffers; the image index is added on top
pub const COMMAND_BUFFER_BASE: u64 = 0x1000;

/// Device-side event, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuEvent {
    Acquire,
    Submit { image_index: u32 },
    Present { image_index: u32 },
    WaitIdle,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: bool,
    pending_image: Option<u32>,
}

#[derive(Debug, Default)]
struct GpuState {
    next_handle: u64,
    semaphores: HashSet<u64>,
    fences: HashMap<u64, FenceState>,
    image_count: u32,
    next_image: u32,
    acquire_calls: u64,
    present_calls: u64,
    acquire_script: HashMap<u64, AcquireOutcome>,
    present_script: HashMap<u64, PresentOutcome>,
    fence_budget: Option<usize>,
    stalled: bool,
    events: Vec<GpuEvent>,
    idle_waits: usize,
    max_outstanding: usize,
}

impl GpuState {
    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn outstanding(&self) -> usize {
        self.fences
            .values()
            .filter(|fence| fence.pending_image.is_some())
            .count()
    }

    fn retire(fence: &mut FenceState) {
        fence.pending_image = None;
        fence.signaled = true;
    }
}

fn misuse(reason: impl Into<String>) -> VulkanError {
    VulkanError::InvalidOperation {
        reason: reason.into(),
    }
}

/// Scriptable in-memory device
///
/// Clones share state, so a test can keep a handle after moving one into the
/// driver.
#[derive(Debug, Clone, Default)]
pub struct MockGpu {
    state: Rc<RefCell<GpuState>>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::with_image_count(3)
    }

    pub fn with_image_count(image_count: u32) -> Self {
        let gpu = Self::default();
        gpu.state.borrow_mut().image_count = image_count;
        gpu
    }

    /// Make the `call`-th acquisition (1-based) return `outcome`
    pub fn script_acquire(&self, call: u64, outcome: AcquireOutcome) {
        self.state.borrow_mut().acquire_script.insert(call, outcome);
    }

    /// Make the `call`-th present (1-based) return `outcome`
    pub fn script_present(&self, call: u64, outcome: PresentOutcome) {
        self.state.borrow_mut().present_script.insert(call, outcome);
    }

    /// Allow `count` more fences to be created, then fail
    pub fn fail_fence_creation_after(&self, count: usize) {
        self.state.borrow_mut().fence_budget = Some(count);
    }

    /// Pending work never retires; bounded waits time out
    pub fn stall(&self) {
        self.state.borrow_mut().stalled = true;
    }

    pub fn is_signaled(&self, fence: vk::Fence) -> bool {
        self.state
            .borrow()
            .fences
            .get(&fence.as_raw())
            .is_some_and(|state| state.signaled)
    }

    /// Semaphores plus fences not yet destroyed
    pub fn live_objects(&self) -> usize {
        let state = self.state.borrow();
        state.semaphores.len() + state.fences.len()
    }

    pub fn idle_waits(&self) -> usize {
        self.state.borrow().idle_waits
    }

    pub fn is_idle(&self) -> bool {
        self.state.borrow().outstanding() == 0
    }

    /// Highest number of simultaneously pending submissions seen
    pub fn max_outstanding(&self) -> usize {
        self.state.borrow().max_outstanding
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        self.state.borrow().events.clone()
    }

    pub fn submits(&self) -> usize {
        self.count(|event| matches!(event, GpuEvent::Submit { .. }))
    }

    pub fn presents(&self) -> usize {
        self.count(|event| matches!(event, GpuEvent::Present { .. }))
    }

    fn count(&self, predicate: impl Fn(&GpuEvent) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| predicate(e)).count()
    }
}

impl GpuQueue for MockGpu {
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let mut state = self.state.borrow_mut();
        let raw = state.allocate();
        state.semaphores.insert(raw);
        Ok(vk::Semaphore::from_raw(raw))
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let mut state = self.state.borrow_mut();
        match state.fence_budget {
            Some(0) => return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)),
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        let raw = state.allocate();
        state.fences.insert(
            raw,
            FenceState {
                signaled,
                pending_image: None,
            },
        );
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state.borrow_mut().semaphores.remove(&semaphore.as_raw());
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state.borrow_mut();
        let removed = state.fences.remove(&fence.as_raw());
        assert!(
            removed.is_some_and(|f| f.pending_image.is_none()),
            "destroyed a fence with pending work"
        );
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VulkanResult<FenceWait> {
        let mut state = self.state.borrow_mut();
        let stalled = state.stalled;
        let fence_state = state
            .fences
            .get_mut(&fence.as_raw())
            .ok_or_else(|| misuse("wait on unknown fence"))?;

        if fence_state.signaled {
            return Ok(FenceWait::Signaled);
        }
        if fence_state.pending_image.is_none() {
            return Err(misuse("wait on an unsignalled fence with no pending work"));
        }
        if stalled {
            return if timeout_ns == u64::MAX {
                Err(misuse("unbounded wait on a stalled device"))
            } else {
                Ok(FenceWait::TimedOut)
            };
        }

        GpuState::retire(fence_state);
        Ok(FenceWait::Signaled)
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let fence_state = state
            .fences
            .get_mut(&fence.as_raw())
            .ok_or_else(|| misuse("reset of unknown fence"))?;
        if fence_state.pending_image.is_some() {
            return Err(misuse("reset of a fence with pending work"));
        }
        fence_state.signaled = false;
        Ok(())
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VulkanResult<AcquireOutcome> {
        let mut state = self.state.borrow_mut();
        if !state.semaphores.contains(&signal.as_raw()) {
            return Err(misuse("acquire with unknown semaphore"));
        }
        state.acquire_calls += 1;
        state.events.push(GpuEvent::Acquire);

        let call = state.acquire_calls;
        if let Some(outcome) = state.acquire_script.remove(&call) {
            return Ok(outcome);
        }

        let image_index = state.next_image;
        state.next_image = (state.next_image + 1) % state.image_count.max(1);
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn submit(
        &self,
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        let image_index = u32::try_from(command_buffer.as_raw() - COMMAND_BUFFER_BASE)
            .map_err(|_| misuse("foreign command buffer"))?;

        if !state.semaphores.contains(&wait.as_raw()) || !state.semaphores.contains(&signal.as_raw()) {
            return Err(misuse("submit with unknown semaphore"));
        }
        if state
            .fences
            .values()
            .any(|f| f.pending_image == Some(image_index))
        {
            return Err(misuse(format!(
                "submit to image {image_index} while an earlier submission still uses it"
            )));
        }

        let fence_state = state
            .fences
            .get_mut(&fence.as_raw())
            .ok_or_else(|| misuse("submit with unknown fence"))?;
        if fence_state.signaled || fence_state.pending_image.is_some() {
            return Err(misuse("submit with a fence that was not reset"));
        }
        fence_state.pending_image = Some(image_index);

        state.events.push(GpuEvent::Submit { image_index });
        state.max_outstanding = state.max_outstanding.max(state.outstanding());
        Ok(())
    }

    fn present(
        &self,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
        _wait: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let mut state = self.state.borrow_mut();
        state.present_calls += 1;
        state.events.push(GpuEvent::Present { image_index });

        let call = state.present_calls;
        Ok(state
            .present_script
            .remove(&call)
            .unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        let mut state = self.state.borrow_mut();
        if state.stalled && state.outstanding() > 0 {
            return Err(misuse("device idle wait on a stalled device"));
        }
        state.fences.values_mut().for_each(GpuState::retire_if_pending);
        state.idle_waits += 1;
        state.events.push(GpuEvent::WaitIdle);
        Ok(())
    }
}

impl GpuState {
    fn retire_if_pending(fence: &mut FenceState) {
        if fence.pending_image.is_some() {
            Self::retire(fence);
        }
    }
}

/// Presentation target that records its regenerations
/// Extent of a freshly built [`MockTarget`], matching the usual test window
pub const INITIAL_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

pub struct MockTarget {
    gpu: MockGpu,
    swapchain: u64,
    image_count: usize,
    extent: vk::Extent2D,
    next_image_count: Option<usize>,
    pub regenerations: Vec<vk::Extent2D>,
    pub fail_regeneration: bool,
}

impl MockTarget {
    pub fn new(gpu: &MockGpu, image_count: usize) -> Self {
        Self {
            gpu: gpu.clone(),
            swapchain: 1,
            image_count,
            extent: INITIAL_EXTENT,
            next_image_count: None,
            regenerations: Vec::new(),
            fail_regeneration: false,
        }
    }

    /// Extent of the live swapchain
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Image count the next regeneration produces
    pub fn set_next_image_count(&mut self, count: usize) {
        self.next_image_count = Some(count);
    }
}

impl PresentationTarget for MockTarget {
    fn swapchain(&self) -> vk::SwapchainKHR {
        vk::SwapchainKHR::from_raw(self.swapchain)
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn command_buffer(&self, image_index: u32) -> Option<vk::CommandBuffer> {
        ((image_index as usize) < self.image_count)
            .then(|| vk::CommandBuffer::from_raw(COMMAND_BUFFER_BASE + u64::from(image_index)))
    }

    fn regenerate(&mut self, framebuffer_extent: vk::Extent2D) -> RegenResult<()> {
        if !self.gpu.is_idle() {
            return Err(RegenError::Device(misuse("regeneration while work is pending")));
        }
        if framebuffer_extent.width == 0 || framebuffer_extent.height == 0 {
            return Err(RegenError::Device(misuse("regeneration with a zero extent")));
        }
        if self.fail_regeneration {
            return Err(RegenError::NodeCreation {
                label: "swapchain",
                source: VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR),
            });
        }

        self.swapchain += 1;
        self.extent = framebuffer_extent;
        if let Some(count) = self.next_image_count.take() {
            self.image_count = count;
            self.gpu.state.borrow_mut().image_count =
                u32::try_from(count).unwrap_or(u32::MAX);
            self.gpu.state.borrow_mut().next_image = 0;
        }
        self.regenerations.push(framebuffer_extent);
        Ok(())
    }
}

/// Window stand-in with a scripted size history
#[derive(Debug)]
pub struct MockSurface {
    size: (u32, u32),
    upcoming: VecDeque<(u32, u32)>,
    resized: bool,
    close_after_polls: Option<usize>,
    pub polls: usize,
    pub blocking_waits: usize,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            upcoming: VecDeque::new(),
            resized: false,
            close_after_polls: None,
            polls: 0,
            blocking_waits: 0,
        }
    }

    /// Change the size now, as a framebuffer-size event would
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.resized = true;
    }

    /// Sizes delivered one per blocking wait
    pub fn queue_sizes(&mut self, sizes: impl IntoIterator<Item = (u32, u32)>) {
        self.upcoming.extend(sizes);
    }

    pub fn close_after_polls(&mut self, polls: usize) {
        self.close_after_polls = Some(polls);
    }
}

impl SurfaceSource for MockSurface {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn wait_events(&mut self) {
        self.blocking_waits += 1;
        if let Some((width, height)) = self.upcoming.pop_front() {
            self.resize(width, height);
        } else if self.close_after_polls.is_none() {
            panic!("blocking wait with no scripted event would hang");
        } else {
            self.close_after_polls = Some(0);
        }
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn should_close(&self) -> bool {
        self.close_after_polls
            .is_some_and(|limit| self.polls >= limit)
    }
}
