//! # Presentation Configuration
//!
//! Everything the presentation core reads at startup: window geometry, the
//! number of frames in flight, how long fence waits may block, the preferred
//! present mode and the shader binaries for the quad pipeline.
//!
//! All structures round-trip through TOML and RON via the [`Config`] trait.

use ash::vk;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// # Shader Configuration
///
/// Paths to the SPIR-V binaries used by the pipeline node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries a handful of common locations so the binary can be started from the
    /// workspace root or from its own crate directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        const SHADER_DIRS: [&str; 4] = ["target/shaders/", "../target/shaders/", "shaders/", "./"];

        let resolve = |name: &str| {
            SHADER_DIRS
                .iter()
                .map(|dir| format!("{dir}{name}"))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("{}{name}", SHADER_DIRS[0]))
        };

        Self::new(resolve(base_vertex), resolve(base_fragment))
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("target/shaders/quad.vert.spv", "target/shaders/quad.frag.spv")
    }
}

/// Window creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial client width in screen coordinates
    pub width: u32,
    /// Initial client height in screen coordinates
    pub height: u32,
    /// Title bar text
    pub title: String,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Present Engine".to_string(),
            resizable: true,
        }
    }
}

/// Present mode requested from the surface
///
/// FIFO is the only mode every surface must support, so any other choice falls
/// back to it when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Low-latency triple buffering
    Mailbox,
    /// Vsync
    Fifo,
    /// No vsync, may tear
    Immediate,
}

impl PresentModePreference {
    /// The Vulkan present mode for this preference
    pub const fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// # Presentation Configuration
///
/// Top-level configuration consumed by the context, the swapchain chain and the
/// presentation driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    /// Application name reported to the Vulkan instance
    pub application_name: String,
    /// Window parameters
    pub window: WindowConfig,
    /// Number of frame slots (default 2)
    pub frames_in_flight: usize,
    /// Upper bound on each fence wait in milliseconds; `None` blocks indefinitely
    pub fence_timeout_ms: Option<u64>,
    /// Present mode to use when the surface supports it
    pub preferred_present_mode: PresentModePreference,
    /// Force validation layers on or off; `None` enables them in debug builds
    pub enable_validation: Option<bool>,
    /// Shader binaries for the pipeline
    pub shaders: ShaderConfig,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            application_name: "Present Engine".to_string(),
            window: WindowConfig::default(),
            frames_in_flight: 2,
            fence_timeout_ms: None,
            preferred_present_mode: PresentModePreference::Mailbox,
            enable_validation: None,
            shaders: ShaderConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl PresentConfig {
    /// Set the number of frames in flight
    #[must_use]
    pub const fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Bound every fence wait to `timeout_ms`
    #[must_use]
    pub const fn with_fence_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.fence_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the preferred present mode
    #[must_use]
    pub const fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.preferred_present_mode = mode;
        self
    }

    /// Set the window geometry and title
    #[must_use]
    pub fn with_window(mut self, width: u32, height: u32, title: impl Into<String>) -> Self {
        self.window.width = width;
        self.window.height = height;
        self.window.title = title.into();
        self
    }

    /// Set the shader configuration
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Fence wait timeout in nanoseconds, as passed to `vkWaitForFences`
    pub fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ms
            .map_or(u64::MAX, |ms| ms.saturating_mul(1_000_000))
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl Config for PresentConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be between 1 and {MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if self.fence_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "fence_timeout_ms of 0 would fail every frame; omit it to wait indefinitely"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PresentConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.fence_timeout_ms, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        assert!(PresentConfig::default().with_frames_in_flight(0).validate().is_err());
        assert!(PresentConfig::default().with_frames_in_flight(1).validate().is_ok());
        assert!(PresentConfig::default()
            .with_frames_in_flight(MAX_FRAMES_IN_FLIGHT)
            .validate()
            .is_ok());
        assert!(PresentConfig::default()
            .with_frames_in_flight(MAX_FRAMES_IN_FLIGHT + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = PresentConfig::default().with_window(0, 600, "zero");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_fence_timeout_conversion() {
        assert_eq!(PresentConfig::default().fence_timeout_ns(), u64::MAX);
        assert_eq!(
            PresentConfig::default().with_fence_timeout_ms(250).fence_timeout_ns(),
            250_000_000
        );
        assert_eq!(
            PresentConfig::default().with_fence_timeout_ms(u64::MAX).fence_timeout_ns(),
            u64::MAX
        );
        assert!(PresentConfig::default().with_fence_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn test_present_mode_mapping() {
        assert_eq!(PresentModePreference::Mailbox.to_vk(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(PresentModePreference::Fifo.to_vk(), vk::PresentModeKHR::FIFO);
        assert_eq!(PresentModePreference::Immediate.to_vk(), vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: PresentConfig = toml::from_str(
            r#"
            frames_in_flight = 3
            fence_timeout_ms = 500

            [window]
            title = "resized"
            "#,
        )
        .unwrap();

        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.fence_timeout_ms, Some(500));
        assert_eq!(config.window.title, "resized");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.preferred_present_mode, PresentModePreference::Mailbox);
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "present_engine_config_{}.toml",
            std::process::id()
        ));
        let config = PresentConfig::default()
            .with_frames_in_flight(3)
            .with_present_mode(PresentModePreference::Fifo);

        config.save_to_file(&path).unwrap();
        let loaded = PresentConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!(
            "present_engine_invalid_{}.ron",
            std::process::id()
        ));
        std::fs::write(&path, "(frames_in_flight: 0)").unwrap();
        let result = PresentConfig::load_from_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = PresentConfig::load_from_file("settings.json");
        assert!(matches!(result, Err(ConfigError::Io(_)) | Err(ConfigError::UnsupportedFormat(_))));
        assert!(matches!(
            PresentConfig::default().save_to_file("settings.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = PresentConfig::load_or_default("definitely/not/here.toml").unwrap();
        assert_eq!(config, PresentConfig::default());
    }
}
