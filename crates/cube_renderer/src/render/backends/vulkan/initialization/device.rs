//! Logical device creation and the device context that owns it

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Instance};

use super::adapter::{enumerate_adapters, select_adapter, AdapterInfo, QueueFamilySelection};
use super::instance::{filter_available, to_cstrings};
use super::{Surface, VulkanInstance};
use crate::config::RendererConfig;
use crate::render::backends::vulkan::memory::MemoryAllocator;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// The single queue, taken from the graphics family
    pub queue: vk::Queue,
    /// Family the queue belongs to
    pub queue_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
    enabled_extensions: Vec<String>,
}

impl LogicalDevice {
    /// Create the device with one queue of priority 1.0 from `queue_family`
    pub fn new(
        instance: &Instance,
        adapter: &AdapterInfo,
        queue_family: u32,
        wanted_layers: &[String],
        wanted_extensions: &[String],
    ) -> VulkanResult<Self> {
        let swapchain_name = SwapchainLoader::name().to_string_lossy().into_owned();
        let enabled_extensions = filter_available("Device extension", wanted_extensions, &adapter.extensions);
        if !enabled_extensions.contains(&swapchain_name) {
            return Err(VulkanError::should_exit(format!(
                "adapter '{}' does not support {}",
                adapter.name, swapchain_name
            )));
        }

        // Device layers are ignored by current loaders but still go through the filter
        let available_layers: Vec<String> = unsafe { instance.enumerate_device_layer_properties(adapter.handle) }
            .map_err(VulkanError::from)?
            .iter()
            .map(|p| super::instance::fixed_name(&p.layer_name))
            .collect();
        let enabled_layers = filter_available("Device layer", wanted_layers, &available_layers);

        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)
            .build()];

        let layer_cstrings = to_cstrings(&enabled_layers)?;
        let extension_cstrings = to_cstrings(&enabled_extensions)?;
        let layer_ptrs: Vec<_> = layer_cstrings.iter().map(|c| c.as_ptr()).collect();
        let extension_ptrs: Vec<_> = extension_cstrings.iter().map(|c| c.as_ptr()).collect();

        let device_features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(adapter.handle, &create_info, None)
                .map_err(VulkanError::from)?
        };
        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::info!(
            "[DEVICE] Logical device created: 1 queue from family {}, {} extension(s)",
            queue_family,
            enabled_extensions.len()
        );

        Ok(Self {
            device,
            queue,
            queue_family,
            swapchain_loader,
            enabled_extensions,
        })
    }

    /// Extensions actually enabled
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// Block until the queue has drained
    pub fn queue_wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.queue_wait_idle(self.queue).map_err(VulkanError::from) }
    }

    /// Block until the whole device has drained
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::from) }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
        log::debug!("[DEVICE] Logical device destroyed");
    }
}

/// Instance, surface, chosen adapter, logical device and memory allocator.
///
/// Fields drop in declaration order: device, then surface, then instance.
pub struct DeviceContext {
    device: LogicalDevice,
    allocator: MemoryAllocator,
    queues: QueueFamilySelection,
    adapter: AdapterInfo,
    surface: Surface,
    instance: VulkanInstance,
}

impl DeviceContext {
    /// Enumerate adapters, pick one, resolve its queue families and create the device
    pub fn new(instance: VulkanInstance, surface: Surface, config: &RendererConfig) -> VulkanResult<Self> {
        let adapter = select_adapter(enumerate_adapters(&instance.instance)?)?;
        let queues = QueueFamilySelection::resolve(&adapter.queue_families, |family| {
            surface.supports_present(adapter.handle, family)
        })?;
        let device = LogicalDevice::new(
            &instance.instance,
            &adapter,
            queues.graphics,
            &config.wanted_device_layers,
            &config.wanted_device_extensions,
        )?;
        let allocator = adapter.memory_allocator();

        Ok(Self {
            device,
            allocator,
            queues,
            adapter,
            surface,
            instance,
        })
    }

    /// Raw device handle
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// The logical device wrapper
    pub fn logical_device(&self) -> &LogicalDevice {
        &self.device
    }

    /// The single device queue
    pub fn queue(&self) -> vk::Queue {
        self.device.queue
    }

    /// Selected queue families
    pub fn queue_families(&self) -> QueueFamilySelection {
        self.queues
    }

    /// Family used for texture-upload command buffers.
    ///
    /// The device owns one queue, so uploads go through the graphics family
    /// even when a dedicated transfer family exists.
    pub fn upload_family(&self) -> u32 {
        if self.queues.transfer != self.queues.graphics {
            log::debug!(
                "[DEVICE] Transfer family {} differs from graphics family {}, uploading on graphics",
                self.queues.transfer,
                self.queues.graphics
            );
        }
        self.queues.graphics
    }

    /// Chosen adapter
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Memory bank matcher for the chosen adapter
    pub fn allocator(&self) -> &MemoryAllocator {
        &self.allocator
    }

    /// Presentation surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Instance wrapper
    pub fn instance(&self) -> &VulkanInstance {
        &self.instance
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Wait for the queue and then the whole device to go idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.queue_wait_idle()?;
        self.device.wait_idle()
    }
}
