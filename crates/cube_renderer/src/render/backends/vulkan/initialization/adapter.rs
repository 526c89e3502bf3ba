//! Adapter enumeration, selection and queue family lookup.
//!
//! The selection rules are pure functions over [`AdapterInfo`] and
//! [`QueueFamily`] so they can be exercised without a GPU.

use ash::{vk, Instance};
use bitflags::bitflags;

use super::instance::fixed_name;
use crate::render::backends::vulkan::memory::{MemoryAllocator, MemoryBank};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Adapter class as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterClass {
    /// Separate GPU
    Discrete,
    /// GPU sharing the CPU package
    Integrated,
    /// Virtualized GPU
    Virtual,
    /// Software rasterizer
    Cpu,
    /// Anything else
    Other,
}

impl From<vk::PhysicalDeviceType> for AdapterClass {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::Virtual,
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            _ => Self::Other,
        }
    }
}

bitflags! {
    /// What a queue family can execute
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueueCapabilities: u32 {
        /// Draw commands
        const GRAPHICS = 0b001;
        /// Dispatch commands
        const COMPUTE = 0b010;
        /// Copy commands
        const TRANSFER = 0b100;
    }
}

impl From<vk::QueueFlags> for QueueCapabilities {
    fn from(flags: vk::QueueFlags) -> Self {
        Self::from_bits_truncate(flags.as_raw())
    }
}

impl QueueCapabilities {
    /// Capability letters, `G`, `C`, `T` or `-`
    pub fn letters(self) -> String {
        [(Self::GRAPHICS, 'G'), (Self::COMPUTE, 'C'), (Self::TRANSFER, 'T')]
            .iter()
            .map(|(flag, letter)| if self.contains(*flag) { *letter } else { '-' })
            .collect()
    }
}

/// One queue family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    /// Family index
    pub index: u32,
    /// Capability bits
    pub capabilities: QueueCapabilities,
    /// Number of queues in the family
    pub queue_count: u32,
}

/// Everything learned about one adapter during enumeration
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Driver handle
    pub handle: vk::PhysicalDevice,
    /// Device name
    pub name: String,
    /// Supported API version
    pub api_version: u32,
    /// PCI vendor id
    pub vendor_id: u32,
    /// Vendor-specific device id
    pub device_id: u32,
    /// Adapter class
    pub class: AdapterClass,
    /// Supported features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory banks in driver order
    pub memory_banks: Vec<MemoryBank>,
    /// Heap sizes and whether each is device-local
    pub memory_heaps: Vec<(u64, bool)>,
    /// Queue families in driver order
    pub queue_families: Vec<QueueFamily>,
    /// Device extensions the adapter exposes
    pub extensions: Vec<String>,
}

impl AdapterInfo {
    /// Query one adapter
    pub fn query(instance: &Instance, handle: vk::PhysicalDevice) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(handle) };
        let features = unsafe { instance.get_physical_device_features(handle) };
        let memory = unsafe { instance.get_physical_device_memory_properties(handle) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(handle) };
        let extensions = unsafe { instance.enumerate_device_extension_properties(handle) }
            .map_err(VulkanError::from)?
            .iter()
            .map(|p| fixed_name(&p.extension_name))
            .collect();

        let memory_heaps = memory.memory_heaps[..memory.memory_heap_count as usize]
            .iter()
            .map(|h| (h.size, h.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL)))
            .collect();

        let queue_families = families
            .iter()
            .enumerate()
            .map(|(i, f)| QueueFamily {
                index: i as u32,
                capabilities: f.queue_flags.into(),
                queue_count: f.queue_count,
            })
            .collect();

        Ok(Self {
            handle,
            name: fixed_name(&properties.device_name),
            api_version: properties.api_version,
            vendor_id: properties.vendor_id,
            device_id: properties.device_id,
            class: properties.device_type.into(),
            features,
            memory_banks: MemoryAllocator::from_properties(&memory).banks().to_vec(),
            memory_heaps,
            queue_families,
            extensions,
        })
    }

    /// Log the full adapter report
    pub fn log_report(&self) {
        log::info!(
            "[DEVICE] Adapter '{}' ({:?}) API {}.{}.{} vendor {:#06x} device {:#06x}",
            self.name,
            self.class,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.vendor_id,
            self.device_id
        );
        for (i, bank) in self.memory_banks.iter().enumerate() {
            log::debug!("[DEVICE]   memory type {:2}: heap {} {}", i, bank.heap_index, bank.flags.describe());
        }
        for (i, (size, device_local)) in self.memory_heaps.iter().enumerate() {
            log::debug!(
                "[DEVICE]   memory heap {}: {} MiB{}",
                i,
                size >> 20,
                if *device_local { " device-local" } else { "" }
            );
        }
        for family in &self.queue_families {
            log::debug!(
                "[DEVICE]   queue family {}: {} queue(s) {}",
                family.index,
                family.queue_count,
                family.capabilities.letters()
            );
        }
    }

    /// Whether the adapter exposes a device extension
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }

    /// Memory allocator over this adapter's banks
    pub fn memory_allocator(&self) -> MemoryAllocator {
        MemoryAllocator::new(self.memory_banks.clone())
    }

}

/// Enumerate every adapter; failing to enumerate or finding none is fatal
pub fn enumerate_adapters(instance: &Instance) -> VulkanResult<Vec<AdapterInfo>> {
    let handles = unsafe { instance.enumerate_physical_devices() }
        .map_err(|e| VulkanError::should_exit(format!("adapter enumeration failed: {e:?}")))?;
    if handles.is_empty() {
        return Err(VulkanError::should_exit("no adapters found"));
    }
    log::info!("[DEVICE] {} adapter(s) found", handles.len());

    handles
        .into_iter()
        .map(|handle| {
            let info = AdapterInfo::query(instance, handle)?;
            info.log_report();
            Ok(info)
        })
        .collect()
}

/// Index of the first discrete adapter, else the first integrated one
pub fn select_adapter_index(classes: impl IntoIterator<Item = AdapterClass> + Clone) -> Option<usize> {
    let position = |wanted: AdapterClass| classes.clone().into_iter().position(|c| c == wanted);
    position(AdapterClass::Discrete).or_else(|| position(AdapterClass::Integrated))
}

/// Pick the adapter to render with; neither discrete nor integrated is fatal
pub fn select_adapter(adapters: Vec<AdapterInfo>) -> VulkanResult<AdapterInfo> {
    let index = select_adapter_index(adapters.iter().map(|a| a.class))
        .ok_or_else(|| VulkanError::should_exit("no discrete or integrated adapter found"))?;
    let chosen = adapters
        .into_iter()
        .nth(index)
        .ok_or_else(|| VulkanError::should_exit("adapter list changed during selection"))?;
    log::info!("[DEVICE] Selected adapter '{}' ({:?})", chosen.name, chosen.class);
    Ok(chosen)
}

/// First family, in enumeration order, with every bit of `capability`
pub fn find_queue_family(families: &[QueueFamily], capability: QueueCapabilities) -> Option<u32> {
    families
        .iter()
        .find(|f| f.capabilities.contains(capability))
        .map(|f| f.index)
}

/// Queue families chosen for each kind of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilySelection {
    /// Family the single device queue comes from
    pub graphics: u32,
    /// Compute family, or the graphics family when none exists
    pub compute: u32,
    /// Transfer family, or the graphics family when none exists
    pub transfer: u32,
}

impl QueueFamilySelection {
    /// Resolve the three families.
    ///
    /// Graphics is required and must be able to present; compute and
    /// transfer quietly fall back to graphics.
    pub fn resolve(
        families: &[QueueFamily],
        supports_present: impl Fn(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Self> {
        let graphics = find_queue_family(families, QueueCapabilities::GRAPHICS)
            .ok_or_else(|| VulkanError::should_exit("no graphics queue family"))?;
        if !supports_present(graphics)? {
            return Err(VulkanError::should_exit(format!(
                "graphics queue family {graphics} cannot present to the surface"
            )));
        }

        let fallback = |capability: QueueCapabilities, name: &str| {
            find_queue_family(families, capability).unwrap_or_else(|| {
                log::info!("[DEVICE] No {} queue family, using graphics family {}", name, graphics);
                graphics
            })
        };
        let selection = Self {
            graphics,
            compute: fallback(QueueCapabilities::COMPUTE, "compute"),
            transfer: fallback(QueueCapabilities::TRANSFER, "transfer"),
        };
        log::info!(
            "[DEVICE] Queue families: graphics {} compute {} transfer {}",
            selection.graphics,
            selection.compute,
            selection.transfer
        );
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(name: &str, class: AdapterClass) -> AdapterInfo {
        AdapterInfo {
            handle: vk::PhysicalDevice::null(),
            name: name.to_string(),
            api_version: vk::API_VERSION_1_0,
            vendor_id: 0,
            device_id: 0,
            class,
            features: vk::PhysicalDeviceFeatures::default(),
            memory_banks: Vec::new(),
            memory_heaps: Vec::new(),
            queue_families: Vec::new(),
            extensions: vec!["VK_KHR_swapchain".to_string()],
        }
    }

    fn family(index: u32, capabilities: QueueCapabilities) -> QueueFamily {
        QueueFamily {
            index,
            capabilities,
            queue_count: 1,
        }
    }

    #[test]
    fn test_discrete_beats_integrated() {
        let chosen = select_adapter(vec![
            adapter("igpu", AdapterClass::Integrated),
            adapter("dgpu", AdapterClass::Discrete),
        ])
        .unwrap();
        assert_eq!(chosen.name, "dgpu");
    }

    #[test]
    fn test_first_integrated_when_no_discrete() {
        let chosen = select_adapter(vec![
            adapter("cpu", AdapterClass::Cpu),
            adapter("igpu0", AdapterClass::Integrated),
            adapter("igpu1", AdapterClass::Integrated),
        ])
        .unwrap();
        assert_eq!(chosen.name, "igpu0");
    }

    #[test]
    fn test_first_discrete_wins() {
        let classes = [AdapterClass::Discrete, AdapterClass::Integrated, AdapterClass::Discrete];
        assert_eq!(select_adapter_index(classes), Some(0));
    }

    #[test]
    fn test_no_usable_adapter_is_fatal() {
        let err = select_adapter(vec![adapter("cpu", AdapterClass::Cpu)]).unwrap_err();
        assert!(err.is_fatal());
        assert!(select_adapter(Vec::new()).is_err());
    }

    #[test]
    fn test_find_queue_family_in_order() {
        let families = [
            family(0, QueueCapabilities::TRANSFER),
            family(1, QueueCapabilities::GRAPHICS | QueueCapabilities::COMPUTE | QueueCapabilities::TRANSFER),
            family(2, QueueCapabilities::COMPUTE),
        ];
        assert_eq!(find_queue_family(&families, QueueCapabilities::GRAPHICS), Some(1));
        assert_eq!(find_queue_family(&families, QueueCapabilities::COMPUTE), Some(1));
        assert_eq!(find_queue_family(&families, QueueCapabilities::TRANSFER), Some(0));
        assert_eq!(find_queue_family(&families[2..], QueueCapabilities::GRAPHICS), None);
    }

    #[test]
    fn test_resolve_falls_back_to_graphics() {
        let families = [family(0, QueueCapabilities::GRAPHICS)];
        let selection = QueueFamilySelection::resolve(&families, |_| Ok(true)).unwrap();
        assert_eq!(
            selection,
            QueueFamilySelection {
                graphics: 0,
                compute: 0,
                transfer: 0
            }
        );
    }

    #[test]
    fn test_resolve_requires_graphics() {
        let families = [family(0, QueueCapabilities::COMPUTE | QueueCapabilities::TRANSFER)];
        let err = QueueFamilySelection::resolve(&families, |_| Ok(true)).unwrap_err();
        assert!(matches!(err, VulkanError::ShouldExit { .. }));
    }

    #[test]
    fn test_resolve_requires_present_support() {
        let families = [family(0, QueueCapabilities::GRAPHICS), family(1, QueueCapabilities::GRAPHICS)];
        assert!(QueueFamilySelection::resolve(&families, |i| Ok(i == 1)).is_err());
    }

    #[test]
    fn test_capability_conversion_and_letters() {
        let caps = QueueCapabilities::from(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER | vk::QueueFlags::SPARSE_BINDING);
        assert_eq!(caps, QueueCapabilities::GRAPHICS | QueueCapabilities::TRANSFER);
        assert_eq!(caps.letters(), "G-T");
    }

    #[test]
    fn test_adapter_class_conversion() {
        assert_eq!(AdapterClass::from(vk::PhysicalDeviceType::DISCRETE_GPU), AdapterClass::Discrete);
        assert_eq!(AdapterClass::from(vk::PhysicalDeviceType::OTHER), AdapterClass::Other);
        assert!(adapter("x", AdapterClass::Other).supports_extension("VK_KHR_swapchain"));
    }
}
