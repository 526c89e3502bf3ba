//! SPIR-V shader modules

use ash::{vk, Device};
use std::ffi::CStr;
use std::path::Path;

use crate::assets::SpirvCode;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Entry point both sample shaders use
pub const ENTRY_POINT: &CStr = c"main";

/// SPIR-V shader module wrapper with automatic resource management
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl ShaderModule {
    /// Create a module from validated SPIR-V
    pub fn new(device: &Device, code: &SpirvCode, stage: vk::ShaderStageFlags) -> VulkanResult<Self> {
        log::debug!("[SHADER] Creating {:?} module from {} bytes", stage, code.byte_len());

        let create_info = vk::ShaderModuleCreateInfo::builder().code(code.words());
        let module = unsafe {
            device.create_shader_module(&create_info, None).map_err(|e| {
                log::error!("[SHADER] vkCreateShaderModule failed: {:?}", e);
                VulkanError::from(e)
            })?
        };

        Ok(Self {
            device: device.clone(),
            module,
            stage,
        })
    }

    /// Load, check the magic number and create the module.
    ///
    /// Unreadable files and bad magic numbers are fatal.
    pub fn from_file(device: &Device, path: impl AsRef<Path>, stage: vk::ShaderStageFlags) -> VulkanResult<Self> {
        let path = path.as_ref();
        log::debug!("[SHADER] Loading shader from: {:?}", path);
        let code = SpirvCode::from_file(path).map_err(|e| {
            log::error!("[SHADER] {}", e);
            VulkanError::from(e)
        })?;
        Self::new(device, &code, stage)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage the module was created for
    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// Stage info with the `main` entry point
    pub fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
