//! Frame pacing and presentation
//!
//! A fixed ring of frame slots bounds how far the CPU may run ahead of the GPU.
//! Each frame waits for its slot, acquires a swapchain image, waits for any
//! older frame still rendering into that image, submits, presents, and reacts to
//! surface invalidation by regenerating the swapchain chain.

mod driver;
mod error;
mod interfaces;
mod sync;


pub use driver::{FrameOutcome, FrameStats, PresentationDriver};
pub use error::{PresentError, PresentResult, WaitStage};
pub use interfaces::{
    AcquireOutcome, BeforeSubmit, FenceWait, GpuQueue, PresentOutcome, PresentationTarget,
    SurfaceSource,
};
pub use sync::{FrameSlot, FrameSynchronizer, SwapchainImageState};
