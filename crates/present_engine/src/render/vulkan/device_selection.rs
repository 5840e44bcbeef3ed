//! Physical device scoring
//!
//! Selection is a pure function over probed candidates so it can be tested
//! without a GPU. Probing lives in the context module.

use ash::vk;

/// Everything selection needs to know about one physical device
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Device handle
    pub handle: vk::PhysicalDevice,
    /// Driver-reported name
    pub name: String,
    /// Discrete, integrated, virtual...
    pub device_type: vk::PhysicalDeviceType,
    /// `limits.maxImageDimension2D`
    pub max_image_dimension_2d: u32,
    /// First queue family with graphics support
    pub graphics_family: Option<u32>,
    /// First queue family that can present to the surface
    pub present_family: Option<u32>,
    /// Whether `VK_KHR_swapchain` is available
    pub supports_swapchain: bool,
    /// Number of surface formats offered for the surface
    pub surface_format_count: usize,
    /// Number of present modes offered for the surface
    pub present_mode_count: usize,
}

/// Queue families of the chosen device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics queue family index
    pub graphics: u32,
    /// Present queue family index
    pub present: u32,
}

impl DeviceCandidate {
    /// Queue families, when both are present
    pub fn queue_families(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics_family?,
            present: self.present_family?,
        })
    }

    /// Why this device cannot render to the surface, if it cannot
    pub fn rejection(&self) -> Option<&'static str> {
        if self.graphics_family.is_none() {
            Some("no graphics queue family")
        } else if self.present_family.is_none() {
            Some("no queue family can present to the surface")
        } else if !self.supports_swapchain {
            Some("VK_KHR_swapchain not supported")
        } else if self.surface_format_count == 0 {
            Some("no surface formats")
        } else if self.present_mode_count == 0 {
            Some("no present modes")
        } else {
            None
        }
    }
}

/// Suitability score; `None` when the device is unusable
///
/// Discrete GPUs get a flat bonus; within a class, larger maximum texture size
/// wins.
pub fn score(candidate: &DeviceCandidate) -> Option<u64> {
    if candidate.rejection().is_some() {
        return None;
    }

    let mut score = u64::from(candidate.max_image_dimension_2d);
    if candidate.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    Some(score)
}

/// Highest-scoring usable device; ties go to the first enumerated
pub fn select_device(candidates: &[DeviceCandidate]) -> Option<&DeviceCandidate> {
    let mut best: Option<(&DeviceCandidate, u64)> = None;

    for candidate in candidates {
        match (score(candidate), best) {
            (Some(value), Some((_, best_value))) if value <= best_value => {}
            (Some(value), _) => best = Some((candidate, value)),
            (None, _) => {
                log::debug!(
                    "Rejected GPU {}: {}",
                    candidate.name,
                    candidate.rejection().unwrap_or("unknown")
                );
            }
        }
    }

    best.map(|(candidate, _)| candidate)
}
