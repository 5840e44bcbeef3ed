//! # Present Engine
//!
//! The presentation core of a small Vulkan renderer: everything between "the
//! application has recorded command buffers" and "pixels reach the window".
//!
//! ## Features
//!
//! - **Regeneration Graph**: swapchain-dependent resources form a parent/child
//!   graph that is torn down and rebuilt in dependency order when the surface
//!   changes
//! - **Frame Pacing**: a bounded number of frames in flight, guarded by per-slot
//!   fences, with cross-frame protection for swapchain images
//! - **Resize Handling**: out-of-date and suboptimal swapchains, explicit resize
//!   notifications and minimized (0×0) windows all funnel into one regeneration
//!   path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use present_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PresentConfig::default();
//!     present_engine::foundation::logging::init(&config.log_level);
//!
//!     let mut window = Window::new(&config.window)?;
//!     let context = VulkanContext::new(&mut window, &config)?;
//!     let chain = SwapchainChain::new(&context, &config, window.framebuffer_extent())?;
//!
//!     let mut driver = PresentationDriver::new(context.queue(), chain, &config)?;
//!     let stats = driver.run_until_closed(&mut window)?;
//!     log::info!("{stats}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod frame;
pub mod regen;
pub mod render;

#[cfg(test)]
pub(crate) mod testing;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{PresentConfig, PresentModePreference, ShaderConfig, WindowConfig},
        config::{Config, ConfigError},
        frame::{
            BeforeSubmit, FrameOutcome, FrameStats, PresentError, PresentResult,
            PresentationDriver, PresentationTarget, SurfaceSource,
        },
        regen::{NodeId, Regenerable, RegenerationGraph, RegenError, RegenResult},
        render::vulkan::{
            CommandRecorder, MvpUniform, RecordContext, SwapchainChain, Vertex, VulkanContext,
            VulkanError, VulkanResult, Window, WindowError,
        },
    };
}
