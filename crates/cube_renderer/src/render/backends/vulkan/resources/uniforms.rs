//! Uniform buffers behind descriptor sets 0..=2.
//!
//! The matrix and misc blocks change every frame and get one buffer per frame
//! slot; the light block is written once and shared.

use ash::Device;

use super::buffer::GpuBuffer;
use crate::render::backends::vulkan::memory::MemoryAllocator;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::scene::SceneState;

/// One buffer per slot for the per-frame blocks, one shared light buffer
pub struct UniformBuffers {
    matrices: Vec<GpuBuffer>,
    misc: Vec<GpuBuffer>,
    light: GpuBuffer,
}

impl UniformBuffers {
    /// Create `slots` copies of the per-frame blocks, all seeded from `scene`
    pub fn new(device: &Device, allocator: &MemoryAllocator, slots: usize, scene: &SceneState) -> VulkanResult<Self> {
        let matrices = (0..slots)
            .map(|_| GpuBuffer::uniform(device, allocator, &scene.matrices))
            .collect::<VulkanResult<Vec<_>>>()?;
        let misc = (0..slots)
            .map(|_| GpuBuffer::uniform(device, allocator, &scene.misc))
            .collect::<VulkanResult<Vec<_>>>()?;
        let light = GpuBuffer::uniform(device, allocator, &scene.light)?;

        log::debug!("[MEMORY] Uniform buffers for {} slot(s)", slots);
        Ok(Self { matrices, misc, light })
    }

    /// Copy the scene's matrix and misc blocks into slot `slot`
    pub fn write(&self, slot: usize, scene: &SceneState) -> VulkanResult<()> {
        let (matrices, misc) = self.slot(slot)?;
        matrices.fill_value(&scene.matrices)?;
        misc.fill_value(&scene.misc)
    }

    /// Matrix and misc buffers of `slot`
    pub fn slot(&self, slot: usize) -> VulkanResult<(&GpuBuffer, &GpuBuffer)> {
        match (self.matrices.get(slot), self.misc.get(slot)) {
            (Some(matrices), Some(misc)) => Ok((matrices, misc)),
            _ => Err(VulkanError::InvalidOperation {
                reason: format!("uniform slot {slot} out of range ({} allocated)", self.matrices.len()),
            }),
        }
    }

    /// Shared light buffer
    pub fn light(&self) -> &GpuBuffer {
        &self.light
    }

}
