//! Instance, adapter and device setup

pub mod adapter;
pub mod device;
pub mod instance;
pub mod surface;

pub use adapter::{
    enumerate_adapters, find_queue_family, select_adapter, AdapterClass, AdapterInfo, QueueCapabilities, QueueFamily,
    QueueFamilySelection,
};
pub use device::{DeviceContext, LogicalDevice};
pub use instance::{filter_available, VulkanInstance};
pub use surface::Surface;
