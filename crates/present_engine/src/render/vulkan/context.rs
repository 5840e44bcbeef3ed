//! Vulkan context management
//!
//! Instance, surface, physical device selection and logical device. None of
//! these change when the window is resized; everything that does lives in the
//! swapchain chain.

use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use thiserror::Error;

use super::device_selection::{self, DeviceCandidate, QueueFamilies};
use super::queue::VulkanQueue;
use super::window::{Window, WindowError};
use crate::core::config::PresentConfig;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Window system failure
    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

fn c_string(value: &str) -> VulkanResult<CString> {
    CString::new(value).map_err(|e| VulkanError::InitializationFailed(format!("Invalid name {value:?}: {e}")))
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, with validation layers when requested
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name_cstr = c_string(app_name)?;
        let engine_name_cstr = c_string("PresentEngine")?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let cstr_extensions = window
            .required_instance_extensions()?
            .iter()
            .map(|ext| c_string(ext))
            .collect::<VulkanResult<Vec<_>>>()?;

        let mut extensions: Vec<*const std::ffi::c_char> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![c_string("VK_LAYER_KHRONOS_validation")?]
        } else {
            Vec::new()
        };
        let layer_names_ptrs: Vec<*const std::ffi::c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!("Created Vulkan instance (validation: {enable_validation})");

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = &self.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Gather what device selection needs about one physical device
pub fn probe_candidate(
    instance: &Instance,
    surface_loader: &Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> VulkanResult<DeviceCandidate> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics_family = None;
    let mut present_family = None;
    for (index, family) in (0u32..).zip(queue_families.iter()) {
        if graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics_family = Some(index);
        }
        let present_support = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(VulkanError::Api)?
        };
        if present_support && present_family.is_none() {
            present_family = Some(index);
        }
        if graphics_family.is_some() && present_family.is_some() {
            break;
        }
    }

    let extensions = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .map_err(VulkanError::Api)?
    };
    let supports_swapchain = extensions.iter().any(|available| {
        let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
        name == SwapchainLoader::name()
    });

    // Formats and modes are only meaningful with the extension
    let (surface_format_count, present_mode_count) = if supports_swapchain {
        unsafe {
            (
                surface_loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(VulkanError::Api)?
                    .len(),
                surface_loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(VulkanError::Api)?
                    .len(),
            )
        }
    } else {
        (0, 0)
    };

    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    Ok(DeviceCandidate {
        handle: device,
        name,
        device_type: properties.device_type,
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        graphics_family,
        present_family,
        supports_swapchain,
        surface_format_count,
        present_mode_count,
    })
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Queue family indices
    pub families: QueueFamilies,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with required queues
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        families: QueueFamilies,
    ) -> VulkanResult<Self> {
        let mut unique_families = vec![families.graphics];
        if families.present != families.graphics {
            unique_families.push(families.present);
        }

        let priorities = [1.0];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            families,
            swapchain_loader,
        })
    }
}

/// Report a failed idle wait ahead of destroying `what`
///
/// Teardown goes ahead either way; returns whether the device reached idle.
fn idle_before_teardown(result: ash::prelude::VkResult<()>, what: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Device wait failed before {what} teardown: {e:?}");
            false
        }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            idle_before_teardown(self.device.device_wait_idle(), "logical device");
            self.device.destroy_device(None);
        }
    }
}

/// Owns every Vulkan object that survives a resize
///
/// Must outlive the swapchain chain and the presentation driver built from it.
pub struct VulkanContext {
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    physical_device: DeviceCandidate,
    // Field order matters: the device is destroyed before the instance
    device: LogicalDevice,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create instance, surface and device for `window`
    pub fn new(window: &mut Window, config: &PresentConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(
            window,
            &config.application_name,
            config.validation_enabled(),
        )?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window.create_vulkan_surface(instance.instance.handle())?;

        let selected = Self::select_physical_device(&instance.instance, &surface_loader, surface)
            .and_then(|candidate| {
                let families = candidate.queue_families().ok_or_else(|| {
                    VulkanError::InitializationFailed("Selected GPU lacks queue families".to_string())
                })?;
                let device = LogicalDevice::new(&instance.instance, candidate.handle, families)?;
                Ok((candidate, device))
            });

        let (physical_device, device) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        log::info!(
            "Selected GPU: {} ({:?}), graphics family {}, present family {}",
            physical_device.name,
            physical_device.device_type,
            device.families.graphics,
            device.families.present
        );

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device,
            instance,
        })
    }

    fn select_physical_device(
        instance: &Instance,
        surface_loader: &Surface,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<DeviceCandidate> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let candidates = devices
            .into_iter()
            .map(|device| probe_candidate(instance, surface_loader, surface, device))
            .collect::<VulkanResult<Vec<_>>>()?;

        device_selection::select_device(&candidates)
            .cloned()
            .ok_or_else(|| VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    /// Queue wrapper for the presentation driver
    pub fn queue(&self) -> VulkanQueue {
        VulkanQueue::new(
            self.device.device.clone(),
            self.device.swapchain_loader.clone(),
            self.device.graphics_queue,
            self.device.present_queue,
        )
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the raw Device handle
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Get the surface handle
    pub const fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the surface loader
    pub const fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Get the swapchain loader
    pub const fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Selected physical device
    pub const fn physical_device(&self) -> &DeviceCandidate {
        &self.physical_device
    }

    /// Queue family indices
    pub const fn queue_families(&self) -> QueueFamilies {
        self.device.families
    }

    /// Block until the device has finished all work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            idle_before_teardown(self.device.device.device_wait_idle(), "surface");
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
