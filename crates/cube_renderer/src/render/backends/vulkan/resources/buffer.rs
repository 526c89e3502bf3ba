//! Host-visible data buffers.
//!
//! Every buffer (vertex, index, uniform) goes through the same path: create,
//! query requirements, allocate from the first host-visible bank, bind at
//! offset zero. Fills map the whole range and must supply exactly the
//! buffer's size.

use ash::{vk, Device};
use bytemuck::Pod;

use crate::render::backends::vulkan::memory::{DeviceMemory, MemoryAllocator, MemoryBankFlags};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Fill precondition: data must be exactly as large as the buffer
pub fn check_fill_size(buffer_size: vk::DeviceSize, data_len: usize) -> VulkanResult<()> {
    if data_len as vk::DeviceSize == buffer_size {
        Ok(())
    } else {
        Err(VulkanError::SizeMismatch {
            expected: buffer_size,
            actual: data_len as u64,
        })
    }
}

/// Buffer plus its dedicated allocation
pub struct GpuBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: DeviceMemory,
    size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Create a host-visible buffer of `size` bytes
    pub fn new(
        device: &Device,
        allocator: &MemoryAllocator,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).map_err(VulkanError::from)? };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let bound = allocator
            .allocate(device, requirements, MemoryBankFlags::HOST_VISIBLE)
            .and_then(|memory| unsafe {
                device
                    .bind_buffer_memory(buffer, memory.handle(), 0)
                    .map(|()| memory)
                    .map_err(VulkanError::from)
            });
        let memory = match bound {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        log::debug!(
            "[MEMORY] Buffer {:?}: {} bytes ({} allocated) in bank {}",
            usage,
            size,
            memory.size(),
            memory.memory_type_index()
        );

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Create and fill in one step
    pub fn with_data(
        device: &Device,
        allocator: &MemoryAllocator,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> VulkanResult<Self> {
        let buffer = Self::new(device, allocator, data.len() as vk::DeviceSize, usage)?;
        buffer.fill(data)?;
        Ok(buffer)
    }

    /// Uniform buffer sized for `T` and holding `value`
    pub fn uniform<T: Pod>(device: &Device, allocator: &MemoryAllocator, value: &T) -> VulkanResult<Self> {
        Self::with_data(
            device,
            allocator,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            bytemuck::bytes_of(value),
        )
    }

    /// Vertex buffer holding `vertices`
    pub fn vertex<T: Pod>(device: &Device, allocator: &MemoryAllocator, vertices: &[T]) -> VulkanResult<Self> {
        Self::with_data(
            device,
            allocator,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(vertices),
        )
    }

    /// Index buffer holding 32-bit `indices`
    pub fn index(device: &Device, allocator: &MemoryAllocator, indices: &[u32]) -> VulkanResult<Self> {
        Self::with_data(
            device,
            allocator,
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(indices),
        )
    }

    /// Map the whole buffer, copy `data`, unmap
    pub fn fill(&self, data: &[u8]) -> VulkanResult<()> {
        check_fill_size(self.size, data.len())?;
        self.memory.write_bytes(0, data)
    }

    /// Fill from a plain-data value
    pub fn fill_value<T: Pod>(&self, value: &T) -> VulkanResult<()> {
        self.fill(bytemuck::bytes_of(value))
    }

    /// Copy the buffer's contents back to the host
    pub fn read_back(&self) -> VulkanResult<Vec<u8>> {
        self.memory.read_bytes(self.size as usize)
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Logical size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Descriptor info covering the whole buffer
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size,
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
        }
        // memory is freed when the field drops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MatrixBlock, MiscBlock};

    #[test]
    fn test_exact_size_is_accepted() {
        assert!(check_fill_size(16, 16).is_ok());
        assert!(check_fill_size(256, std::mem::size_of::<MatrixBlock>()).is_ok());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let err = check_fill_size(std::mem::size_of::<MiscBlock>() as u64, 12).unwrap_err();
        match err {
            VulkanError::SizeMismatch { expected, actual } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 12);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_fill_size(4, 8).is_err());
    }
}
