//! Instance creation with wanted-vs-available layer and extension filtering

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use std::ffi::{CStr, CString};

use crate::config::RendererConfig;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Keep the wanted names the runtime reports as available, in wanted order.
///
/// Missing names are dropped with a log line, never an error.
pub fn filter_available(kind: &str, wanted: &[String], available: &[String]) -> Vec<String> {
    let mut kept = Vec::with_capacity(wanted.len());
    for name in wanted {
        if kept.contains(name) {
            continue;
        }
        if available.contains(name) {
            log::debug!("[DEVICE] {} '{}' available, enabling", kind, name);
            kept.push(name.clone());
        } else {
            log::info!("[DEVICE] {} '{}' not available, skipping", kind, name);
        }
    }
    kept
}

pub(crate) fn to_cstrings(names: &[String]) -> VulkanResult<Vec<CString>> {
    names
        .iter()
        .map(|n| {
            CString::new(n.as_str())
                .map_err(|_| VulkanError::InitializationFailed(format!("name contains NUL: {n:?}")))
        })
        .collect()
}

pub(crate) fn fixed_name(raw: &[std::os::raw::c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    enabled_layers: Vec<String>,
    enabled_extensions: Vec<String>,
}

impl VulkanInstance {
    /// Create the instance.
    ///
    /// `window_extensions` are the ones the window system needs for its surface;
    /// they are requested together with the configured wish list.
    pub fn new(config: &RendererConfig, window_extensions: &[String]) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::should_exit(format!("Failed to load Vulkan: {e}")))?;

        let available_layers: Vec<String> = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::from)?
            .iter()
            .map(|p| fixed_name(&p.layer_name))
            .collect();
        let available_extensions: Vec<String> = entry
            .enumerate_instance_extension_properties(None)
            .map_err(VulkanError::from)?
            .iter()
            .map(|p| fixed_name(&p.extension_name))
            .collect();
        log::debug!(
            "[DEVICE] {} instance layers, {} instance extensions available",
            available_layers.len(),
            available_extensions.len()
        );

        let validation = config.validation_enabled();
        let wanted_layers: &[String] = if validation { &config.wanted_instance_layers } else { &[] };
        let enabled_layers = filter_available("Instance layer", wanted_layers, &available_layers);

        let mut wanted_extensions = window_extensions.to_vec();
        let debug_name = DebugUtils::name().to_string_lossy().into_owned();
        wanted_extensions.extend(
            config
                .wanted_instance_extensions
                .iter()
                .filter(|e| validation || **e != debug_name)
                .cloned(),
        );
        let enabled_extensions = filter_available("Instance extension", &wanted_extensions, &available_extensions);

        if let Some(missing) = window_extensions.iter().find(|e| !enabled_extensions.contains(e)) {
            return Err(VulkanError::should_exit(format!(
                "window system extension {missing} is not available"
            )));
        }

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("application name contains NUL".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let layer_cstrings = to_cstrings(&enabled_layers)?;
        let extension_cstrings = to_cstrings(&enabled_extensions)?;
        let layer_ptrs: Vec<*const std::os::raw::c_char> = layer_cstrings.iter().map(|c| c.as_ptr()).collect();
        let extension_ptrs: Vec<*const std::os::raw::c_char> =
            extension_cstrings.iter().map(|c| c.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(VulkanError::from)? };
        log::info!(
            "[DEVICE] Instance created with {} layer(s), {} extension(s)",
            enabled_layers.len(),
            enabled_extensions.len()
        );

        let debug_utils = if validation && enabled_extensions.contains(&debug_name) {
            let loader = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    log::warn!("[DEVICE] Debug messenger unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            enabled_layers,
            enabled_extensions,
        })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
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
                .map_err(VulkanError::from)
        }
    }

    /// Layers actually enabled
    pub fn enabled_layers(&self) -> &[String] {
        &self.enabled_layers
    }

    /// Extensions actually enabled
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("[DEVICE] Instance destroyed");
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
