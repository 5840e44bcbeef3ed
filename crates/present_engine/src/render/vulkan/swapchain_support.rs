//! Surface capabilities and swapchain parameter selection

use ash::extensions::khr::Surface;
use ash::vk;

use super::{VulkanError, VulkanResult};

/// What the surface currently supports
///
/// Re-queried on every regeneration: the extent and sometimes the image count
/// limits change with the window.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Extent and image count limits, current transform
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format/color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query the surface for a physical device
    pub fn query(
        surface_loader: &Surface,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<Self> {
        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Prefer 8-bit sRGB BGRA, otherwise the first format offered
    pub fn choose_format(&self) -> VulkanResult<vk::SurfaceFormatKHR> {
        self.formats
            .iter()
            .find(|sf| {
                sf.format == vk::Format::B8G8R8A8_SRGB
                    && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| self.formats.first())
            .copied()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "surface offers no formats".to_string(),
            })
    }

    /// The preferred mode when offered, FIFO otherwise
    pub fn choose_present_mode(&self, preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
        if self.present_modes.contains(&preferred) {
            preferred
        } else {
            vk::PresentModeKHR::FIFO
        }
    }

    /// Surface extent, or the framebuffer size clamped into the supported range
    /// when the surface leaves it to the application
    pub fn choose_extent(&self, framebuffer: vk::Extent2D) -> vk::Extent2D {
        let caps = &self.capabilities;
        if caps.current_extent.width != u32::MAX {
            return caps.current_extent;
        }

        vk::Extent2D {
            width: framebuffer
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }

    /// One more than the minimum, capped at the maximum when there is one
    pub const fn choose_image_count(&self) -> u32 {
        let caps = &self.capabilities;
        let desired = caps.min_image_count + 1;
        if caps.max_image_count > 0 && desired > caps.max_image_count {
            caps.max_image_count
        } else {
            desired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support(current: (u32, u32), min_images: u32, max_images: u32) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: min_images,
                max_image_count: max_images,
                current_extent: vk::Extent2D {
                    width: current.0,
                    height: current.1,
                },
                min_image_extent: vk::Extent2D {
                    width: 64,
                    height: 64,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 2048,
                },
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE],
        }
    }

    #[test]
    fn test_prefers_srgb_bgra() {
        let chosen = support((800, 600), 2, 3).choose_format().unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let mut s = support((800, 600), 2, 3);
        s.formats.truncate(1);
        assert_eq!(s.choose_format().unwrap().format, vk::Format::R8G8B8A8_UNORM);

        s.formats.clear();
        assert!(s.choose_format().is_err());
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let s = support((800, 600), 2, 3);
        assert_eq!(
            s.choose_present_mode(vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            s.choose_present_mode(vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_follows_surface_when_defined() {
        let s = support((1024, 768), 2, 3);
        let extent = s.choose_extent(vk::Extent2D {
            width: 10,
            height: 10,
        });
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 1024,
                height: 768
            }
        );
    }

    #[test]
    fn test_extent_clamped_when_undefined() {
        let s = support((u32::MAX, u32::MAX), 2, 3);
        let extent = s.choose_extent(vk::Extent2D {
            width: 8000,
            height: 10,
        });
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 4096,
                height: 64
            }
        );
    }

    #[test]
    fn test_image_count() {
        assert_eq!(support((1, 1), 2, 3).choose_image_count(), 3);
        assert_eq!(support((1, 1), 3, 3).choose_image_count(), 3);
        // No upper limit
        assert_eq!(support((1, 1), 2, 0).choose_image_count(), 3);
    }
}
