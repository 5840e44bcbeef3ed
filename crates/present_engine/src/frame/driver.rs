//! Presentation driver
//!
//! Runs the per-frame protocol against a [`GpuQueue`] and a
//! [`PresentationTarget`]:
//!
//! 1. wait for the current slot's fence
//! 2. acquire an image (out of date: regenerate and skip the frame)
//! 3. wait for any older frame still using that image, then claim it
//! 4. run the before-submit hook
//! 5. reset the slot fence and submit
//! 6. present (out of date, suboptimal or resized: regenerate once)
//! 7. advance to the next slot
//!
//! Any error is fatal and leaves the driver faulted.

use std::fmt;

use ash::vk;

use super::error::{PresentError, PresentResult, WaitStage};
use super::interfaces::{
    AcquireOutcome, BeforeSubmit, FenceWait, GpuQueue, PresentOutcome, PresentationTarget,
    SurfaceSource,
};
use super::sync::FrameSynchronizer;
use crate::config::Config;
use crate::core::config::PresentConfig;

/// What happened to one call of [`PresentationDriver::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented
    Presented {
        /// Image the frame rendered into
        image_index: u32,
        /// Whether the swapchain was rebuilt after presenting
        regenerated: bool,
    },
    /// Acquisition found the swapchain out of date; it was rebuilt and nothing
    /// was submitted
    Skipped,
}

/// Counters accumulated over the driver's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames submitted and presented
    pub frames_presented: u64,
    /// Frames abandoned at acquisition
    pub frames_skipped: u64,
    /// Completed regeneration passes
    pub regenerations: u64,
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frame(s) presented, {} skipped, {} regeneration(s)",
            self.frames_presented, self.frames_skipped, self.regenerations
        )
    }
}

/// Owns the frame slots and drives one frame at a time
pub struct PresentationDriver<G: GpuQueue, T: PresentationTarget> {
    gpu: G,
    target: T,
    sync: FrameSynchronizer,
    hook: Option<Box<dyn BeforeSubmit<T>>>,
    fence_timeout_ns: u64,
    resize_requested: bool,
    faulted: bool,
    stats: FrameStats,
}

impl<G: GpuQueue, T: PresentationTarget> PresentationDriver<G, T> {
    /// Create the frame slots for `target`
    ///
    /// `target` must be fully live.
    pub fn new(gpu: G, target: T, config: &PresentConfig) -> PresentResult<Self> {
        config
            .validate()
            .map_err(|e| PresentError::Config(e.to_string()))?;

        let sync = FrameSynchronizer::new(&gpu, config.frames_in_flight, target.image_count())?;

        Ok(Self {
            gpu,
            target,
            sync,
            hook: None,
            fence_timeout_ns: config.fence_timeout_ns(),
            resize_requested: false,
            faulted: false,
            stats: FrameStats::default(),
        })
    }

    /// Install the strategy called once per frame before submission
    pub fn set_before_submit(&mut self, hook: impl BeforeSubmit<T> + 'static) {
        self.hook = Some(Box::new(hook));
    }

    /// Remove the before-submit hook
    pub fn clear_before_submit(&mut self) {
        self.hook = None;
    }

    /// Force a regeneration after the next present
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    /// Counters so far
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Whether an earlier error stopped the driver
    pub const fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// The presentation target
    pub const fn target(&self) -> &T {
        &self.target
    }

    /// The presentation target, mutable
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// The device queue
    pub const fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Frame slots and image map
    pub const fn synchronizer(&self) -> &FrameSynchronizer {
        &self.sync
    }

    /// Draw one frame
    ///
    /// After an `Err` every further call returns [`PresentError::Faulted`].
    pub fn draw_frame<S: SurfaceSource>(&mut self, surface: &mut S) -> PresentResult<FrameOutcome> {
        if self.faulted {
            return Err(PresentError::Faulted);
        }

        let result = self.draw_frame_inner(surface);
        if result.is_err() {
            self.faulted = true;
        }
        result
    }

    fn draw_frame_inner<S: SurfaceSource>(&mut self, surface: &mut S) -> PresentResult<FrameOutcome> {
        let slot = self.sync.current_slot();

        self.wait_fence(slot.in_flight, WaitStage::FrameSlot)?;

        let image_index = match self
            .gpu
            .acquire_next_image(self.target.swapchain(), slot.image_available)?
        {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    log::debug!("Acquired image {image_index} from a suboptimal swapchain");
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date at acquire, skipping frame");
                self.regenerate(surface)?;
                self.stats.frames_skipped += 1;
                return Ok(FrameOutcome::Skipped);
            }
        };

        if !self.sync.images().contains(image_index) {
            return Err(PresentError::ImageOutOfRange {
                index: image_index,
                count: self.sync.images().len(),
            });
        }

        if let Some(previous) = self.sync.images().fence(image_index) {
            if previous != slot.in_flight {
                log::trace!("Image {image_index} still owned by another frame, waiting");
                self.wait_fence(previous, WaitStage::SwapchainImage)?;
            }
        }
        self.sync.images_mut().assign(image_index, slot.in_flight);

        if let Some(hook) = self.hook.as_mut() {
            hook.before_submit(image_index, &mut self.target)?;
        }

        let command_buffer =
            self.target
                .command_buffer(image_index)
                .ok_or(PresentError::ImageOutOfRange {
                    index: image_index,
                    count: self.target.image_count(),
                })?;

        self.gpu.reset_fence(slot.in_flight)?;
        self.gpu.submit(
            command_buffer,
            slot.image_available,
            slot.render_finished,
            slot.in_flight,
        )?;

        let outcome = self
            .gpu
            .present(self.target.swapchain(), image_index, slot.render_finished)?;
        let resized = std::mem::take(&mut self.resize_requested) | surface.take_resized();

        let regenerated = match outcome {
            PresentOutcome::Presented if !resized => false,
            _ => {
                log::debug!("Present returned {outcome:?} (resized: {resized}), regenerating");
                self.regenerate(surface)?
            }
        };

        self.stats.frames_presented += 1;
        self.sync.advance();

        Ok(FrameOutcome::Presented {
            image_index,
            regenerated,
        })
    }

    fn wait_fence(&self, fence: vk::Fence, stage: WaitStage) -> PresentResult<()> {
        match self.gpu.wait_for_fence(fence, self.fence_timeout_ns)? {
            FenceWait::Signaled => Ok(()),
            FenceWait::TimedOut => Err(PresentError::Timeout { stage }),
        }
    }

    /// Wait for a drawable surface and an idle device, then rebuild the target
    ///
    /// Returns `false` when the window was closed while still minimized.
    fn regenerate<S: SurfaceSource>(&mut self, surface: &mut S) -> PresentResult<bool> {
        let (mut width, mut height) = surface.framebuffer_size();
        while width == 0 || height == 0 {
            if surface.should_close() {
                log::debug!("Window closed while minimized, regeneration abandoned");
                return Ok(false);
            }
            surface.wait_events();
            (width, height) = surface.framebuffer_size();
        }

        self.gpu.wait_idle()?;

        let extent = vk::Extent2D { width, height };
        self.target.regenerate(extent)?;
        self.sync.reset_images(self.target.image_count());

        // Resize events delivered while waiting are covered by this pass
        self.resize_requested = false;
        surface.take_resized();

        self.stats.regenerations += 1;
        log::info!(
            "Swapchain regenerated at {}x{} with {} image(s)",
            width,
            height,
            self.target.image_count()
        );
        Ok(true)
    }

    /// Draw until the surface asks to close, then wait for the device to go idle
    pub fn run_until_closed<S: SurfaceSource>(&mut self, surface: &mut S) -> PresentResult<FrameStats> {
        while !surface.should_close() {
            surface.poll_events();
            if surface.should_close() {
                break;
            }
            self.draw_frame(surface)?;
        }

        self.gpu.wait_idle()?;
        log::info!("Frame loop finished: {}", self.stats);
        Ok(self.stats)
    }

    /// Wait idle and destroy the frame slots
    ///
    /// The driver is faulted afterwards. Dropping the driver does the same,
    /// but only this method reports failures.
    pub fn shutdown(&mut self) -> PresentResult<()> {
        self.faulted = true;
        self.sync.destroy(&self.gpu)?;
        Ok(())
    }
}

impl<G: GpuQueue, T: PresentationTarget> Drop for PresentationDriver<G, T> {
    fn drop(&mut self) {
        if let Err(e) = self.sync.destroy(&self.gpu) {
            log::error!("Failed to release frame slots: {e}");
        }
    }
}
