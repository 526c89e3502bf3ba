//! Rendering: the GLFW window and the Vulkan backend

pub mod backends;
pub mod window;

pub use backends::vulkan::{RenderContext, VulkanError, VulkanResult};
pub use window::{Window, WindowError};
