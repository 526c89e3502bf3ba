//! Descriptor set layouts, pool and the four-set groups the pipeline binds.
//!
//! The layout is fixed and shared with the shaders by convention:
//!
//! | set | binding 0              | stages            |
//! |-----|------------------------|-------------------|
//! | 0   | matrix uniform block   | vertex            |
//! | 1   | light uniform block    | vertex + fragment |
//! | 2   | misc uniform block     | vertex + fragment |
//! | 3   | combined image sampler | fragment          |
//!
//! One `[vk::DescriptorSet; 4]` group is allocated per frame slot.

use ash::{vk, Device};

use super::buffer::GpuBuffer;
use super::texture::Texture;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Number of descriptor sets the pipeline layout declares
pub const SET_COUNT: usize = 4;

/// One binding-0 entry of the fixed layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetBinding {
    /// Descriptor kind
    pub descriptor_type: vk::DescriptorType,
    /// Stages that read it
    pub stage_flags: vk::ShaderStageFlags,
}

/// The layout of sets 0..=3, in set order
pub fn fixed_set_bindings() -> [SetBinding; SET_COUNT] {
    let vertex_fragment = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
    [
        SetBinding {
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            stage_flags: vk::ShaderStageFlags::VERTEX,
        },
        SetBinding {
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            stage_flags: vertex_fragment,
        },
        SetBinding {
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            stage_flags: vertex_fragment,
        },
        SetBinding {
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
        },
    ]
}

/// Pool sizes and set count for `slots` groups of the fixed layout
pub fn pool_requirements(slots: u32) -> (u32, Vec<vk::DescriptorPoolSize>) {
    let bindings = fixed_set_bindings();
    let count = |ty: vk::DescriptorType| bindings.iter().filter(|b| b.descriptor_type == ty).count() as u32;

    let sizes = [vk::DescriptorType::UNIFORM_BUFFER, vk::DescriptorType::COMBINED_IMAGE_SAMPLER]
        .into_iter()
        .map(|ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: count(ty) * slots,
        })
        .collect();
    (SET_COUNT as u32 * slots, sizes)
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Single-binding layout at binding 0
    pub fn new(device: &Device, binding: SetBinding) -> VulkanResult<Self> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(binding.descriptor_type)
            .descriptor_count(1)
            .stage_flags(binding.stage_flags)
            .build()];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::from)?;

        Ok(Self {
            layout,
            device: device.clone(),
        })
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool sized for a number of frame slots
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool holding `slots` groups of the fixed layout
    pub fn new(device: &Device, slots: u32) -> VulkanResult<Self> {
        let (max_sets, pool_sizes) = pool_requirements(slots);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::from)?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate one set per layout
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::from)
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            // Frees every set allocated from the pool
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// The resources one group of sets points at
pub struct SlotBindings<'a> {
    /// Set 0
    pub matrices: &'a GpuBuffer,
    /// Set 1
    pub light: &'a GpuBuffer,
    /// Set 2
    pub misc: &'a GpuBuffer,
    /// Set 3
    pub texture: &'a Texture,
}

/// Layouts, pool and one set group per frame slot
pub struct DescriptorBindings {
    groups: Vec<[vk::DescriptorSet; SET_COUNT]>,
    // owns every set in `groups`
    _pool: DescriptorPool,
    layouts: [DescriptorSetLayout; SET_COUNT],
}

impl DescriptorBindings {
    /// Create the four layouts and allocate `slots` set groups
    pub fn new(device: &Device, slots: usize) -> VulkanResult<Self> {
        let [b0, b1, b2, b3] = fixed_set_bindings();
        let layouts = [
            DescriptorSetLayout::new(device, b0)?,
            DescriptorSetLayout::new(device, b1)?,
            DescriptorSetLayout::new(device, b2)?,
            DescriptorSetLayout::new(device, b3)?,
        ];
        let pool = DescriptorPool::new(device, slots as u32)?;

        let handles = layouts.each_ref().map(DescriptorSetLayout::handle);
        let groups = (0..slots)
            .map(|_| {
                pool.allocate(&handles)?
                    .try_into()
                    .map_err(|sets: Vec<vk::DescriptorSet>| VulkanError::InvalidOperation {
                        reason: format!("driver returned {} descriptor sets, expected {}", sets.len(), SET_COUNT),
                    })
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!("[PIPELINE] Allocated {} descriptor set group(s)", groups.len());

        Ok(Self {
            groups,
            _pool: pool,
            layouts,
        })
    }

    /// Point slot `slot`'s sets at its buffers and the texture
    pub fn write_slot(&self, device: &Device, slot: usize, bindings: &SlotBindings<'_>) -> VulkanResult<()> {
        let sets = self.sets(slot)?;

        let buffer_infos = [
            [bindings.matrices.descriptor_info()],
            [bindings.light.descriptor_info()],
            [bindings.misc.descriptor_info()],
        ];
        let image_info = [bindings.texture.descriptor_info()];

        let mut writes: Vec<vk::WriteDescriptorSet> = buffer_infos
            .iter()
            .zip(sets)
            .map(|(info, set)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(info)
                    .build()
            })
            .collect();
        writes.push(
            vk::WriteDescriptorSet::builder()
                .dst_set(sets[3])
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info)
                .build(),
        );

        // buffer_infos and image_info outlive this call
        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
        Ok(())
    }

    /// The set group for `slot`
    pub fn sets(&self, slot: usize) -> VulkanResult<[vk::DescriptorSet; SET_COUNT]> {
        self.groups.get(slot).copied().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("descriptor slot {slot} out of range ({} allocated)", self.groups.len()),
        })
    }

    /// Layout handles in set order, for the pipeline layout
    pub fn layout_handles(&self) -> [vk::DescriptorSetLayout; SET_COUNT] {
        self.layouts.each_ref().map(DescriptorSetLayout::handle)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_layout_matches_shader_contract() {
        let bindings = fixed_set_bindings();
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        for set in &bindings[1..3] {
            assert_eq!(set.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
            assert!(set.stage_flags.contains(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT));
        }
        assert_eq!(bindings[3].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[3].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sized_per_slot() {
        let (max_sets, sizes) = pool_requirements(1);
        assert_eq!(max_sets, 4);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 3);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 1);

        let (max_sets, sizes) = pool_requirements(2);
        assert_eq!(max_sets, 8);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert_eq!(sizes[1].descriptor_count, 2);
    }
}
