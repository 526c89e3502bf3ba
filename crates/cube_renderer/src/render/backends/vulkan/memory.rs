//! Memory bank selection and owned device allocations.
//!
//! Bank selection is first-fit by ascending index: the first bank that the
//! resource may live in and whose flags include every required flag wins,
//! even when a later bank matches more precisely.

use ash::vk;
use bitflags::bitflags;

use super::{VulkanError, VulkanResult};

bitflags! {
    /// Access properties of a memory bank
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryBankFlags: u32 {
        /// Fastest for device access, usually not mappable
        const DEVICE_LOCAL = 0b0_0001;
        /// Mappable by the host
        const HOST_VISIBLE = 0b0_0010;
        /// Host writes visible without explicit flushes
        const HOST_COHERENT = 0b0_0100;
        /// Host reads are cached
        const HOST_CACHED = 0b0_1000;
        /// Backing may be allocated lazily
        const LAZILY_ALLOCATED = 0b1_0000;
    }
}

impl From<vk::MemoryPropertyFlags> for MemoryBankFlags {
    fn from(flags: vk::MemoryPropertyFlags) -> Self {
        // Bit positions coincide with the Vulkan definitions
        Self::from_bits_truncate(flags.as_raw())
    }
}

impl From<MemoryBankFlags> for vk::MemoryPropertyFlags {
    fn from(flags: MemoryBankFlags) -> Self {
        Self::from_raw(flags.bits())
    }
}

impl MemoryBankFlags {
    /// Short flag names for the adapter report
    pub fn describe(self) -> String {
        if self.is_empty() {
            return "-".to_string();
        }
        self.iter_names().map(|(name, _)| name).collect::<Vec<_>>().join(" | ")
    }
}

/// One memory type as reported by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBank {
    /// Heap the bank allocates from
    pub heap_index: u32,
    /// Size of that heap in bytes
    pub heap_size: u64,
    /// Access properties
    pub flags: MemoryBankFlags,
}

/// First bank `i` with bit `i` set in `type_bits` and all `required` flags
pub fn find_memory_index(banks: &[MemoryBank], required: MemoryBankFlags, type_bits: u32) -> Option<u32> {
    banks
        .iter()
        .enumerate()
        .take(32)
        .find(|(i, bank)| type_bits & (1 << i) != 0 && bank.flags.contains(required))
        .map(|(i, _)| i as u32)
}

/// Maps memory requirements to bank indices using the adapter's memory report
#[derive(Debug, Clone)]
pub struct MemoryAllocator {
    banks: Vec<MemoryBank>,
}

impl MemoryAllocator {
    /// Build from the adapter's memory report
    pub fn new(banks: Vec<MemoryBank>) -> Self {
        Self { banks }
    }

    /// Build straight from the driver's memory properties
    pub fn from_properties(properties: &vk::PhysicalDeviceMemoryProperties) -> Self {
        let banks = properties.memory_types[..properties.memory_type_count as usize]
            .iter()
            .map(|ty| MemoryBank {
                heap_index: ty.heap_index,
                heap_size: properties.memory_heaps[ty.heap_index as usize].size,
                flags: ty.property_flags.into(),
            })
            .collect();
        Self::new(banks)
    }

    /// The reported banks
    pub fn banks(&self) -> &[MemoryBank] {
        &self.banks
    }

    /// First-fit bank for the requirement; failing is fatal to the allocation
    pub fn find_memory_index(&self, required: MemoryBankFlags, type_bits: u32) -> VulkanResult<u32> {
        find_memory_index(&self.banks, required, type_bits).ok_or(VulkanError::NoSuitableMemoryType {
            required: required.into(),
            type_bits,
        })
    }

    /// Bank for GPU-resident resources
    pub fn device_local(&self, type_bits: u32) -> VulkanResult<u32> {
        self.find_memory_index(MemoryBankFlags::DEVICE_LOCAL, type_bits)
    }

    /// Bank for resources the host maps directly
    pub fn host_visible(&self, type_bits: u32) -> VulkanResult<u32> {
        self.find_memory_index(MemoryBankFlags::HOST_VISIBLE, type_bits)
    }

    /// Allocate a dedicated block for `requirements` from a bank with `required` flags
    pub fn allocate(
        &self,
        device: &ash::Device,
        requirements: vk::MemoryRequirements,
        required: MemoryBankFlags,
    ) -> VulkanResult<DeviceMemory> {
        let memory_type_index = self.find_memory_index(required, requirements.memory_type_bits)?;
        log::trace!(
            "[MEMORY] Allocating {} bytes from bank {} ({})",
            requirements.size,
            memory_type_index,
            required.describe()
        );

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.allocate_memory(&alloc_info, None).map_err(VulkanError::from)? };

        let coherent = self.banks[memory_type_index as usize]
            .flags
            .contains(MemoryBankFlags::HOST_COHERENT);

        Ok(DeviceMemory {
            device: device.clone(),
            memory,
            size: requirements.size,
            memory_type_index,
            coherent,
        })
    }
}

/// A contiguous copy from host bytes into mapped memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCopy {
    /// Offset into the source bytes
    pub src: usize,
    /// Offset into the mapping
    pub dst: usize,
    /// Bytes to copy
    pub len: usize,
}

impl ByteCopy {
    /// `len` leading source bytes placed at `dst`
    pub fn at(dst: usize, len: usize) -> Self {
        Self { src: 0, dst, len }
    }
}

/// Perform every copy in `plan` from `src` into `dst`.
///
/// A copy that reaches past either slice fails with `SizeMismatch` and
/// leaves the remaining copies undone.
pub fn apply_copies(dst: &mut [u8], plan: &[ByteCopy], src: &[u8]) -> VulkanResult<()> {
    for copy in plan {
        let source = src.get(copy.src..copy.src + copy.len);
        let capacity = dst.len();
        let target = dst.get_mut(copy.dst..copy.dst + copy.len);
        match (source, target) {
            (Some(source), Some(target)) => target.copy_from_slice(source),
            _ => {
                return Err(VulkanError::SizeMismatch {
                    expected: capacity as u64,
                    actual: (copy.dst + copy.len) as u64,
                })
            }
        }
    }
    Ok(())
}

/// Inverse of [`apply_copies`]: pull the bytes `plan` placed in `mapped` back into a packed buffer
pub fn gather_copies(mapped: &[u8], plan: &[ByteCopy]) -> VulkanResult<Vec<u8>> {
    let packed_len = plan.iter().map(|c| c.src + c.len).max().unwrap_or(0);
    let mut packed = vec![0u8; packed_len];
    for copy in plan {
        let source = mapped.get(copy.dst..copy.dst + copy.len).ok_or(VulkanError::SizeMismatch {
            expected: mapped.len() as u64,
            actual: (copy.dst + copy.len) as u64,
        })?;
        packed[copy.src..copy.src + copy.len].copy_from_slice(source);
    }
    Ok(packed)
}

/// One allocation, freed on drop
pub struct DeviceMemory {
    device: ash::Device,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    memory_type_index: u32,
    coherent: bool,
}

impl DeviceMemory {
    /// Map the whole allocation
    pub fn map(&self) -> VulkanResult<*mut u8> {
        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map(|ptr| ptr.cast::<u8>())
                .map_err(VulkanError::from)
        }
    }

    /// Unmap the allocation
    pub fn unmap(&self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Map, hand the mapping to `access`, flush after writes to a non-coherent bank, unmap
    fn with_mapping<R>(&self, write: bool, access: impl FnOnce(&mut [u8]) -> VulkanResult<R>) -> VulkanResult<R> {
        let ptr = self.map()?;
        let mapped = unsafe { std::slice::from_raw_parts_mut(ptr, self.size as usize) };
        let outcome = access(mapped).and_then(|value| {
            if write {
                self.flush()?;
            }
            Ok(value)
        });
        self.unmap();
        outcome
    }

    /// Copy `bytes` to `offset`
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) -> VulkanResult<()> {
        self.write_regions(&[ByteCopy::at(offset, bytes.len())], bytes)
    }

    /// Map once and perform every copy in `plan` from `bytes` into the mapping
    pub fn write_regions(&self, plan: &[ByteCopy], bytes: &[u8]) -> VulkanResult<()> {
        self.with_mapping(true, |mapped| apply_copies(mapped, plan, bytes))
    }

    fn flush(&self) -> VulkanResult<()> {
        if self.coherent {
            return Ok(());
        }
        let range = vk::MappedMemoryRange::builder()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .build();
        unsafe {
            self.device
                .flush_mapped_memory_ranges(&[range])
                .map_err(VulkanError::from)
        }
    }

    /// Copy the first `len` bytes out
    pub fn read_bytes(&self, len: usize) -> VulkanResult<Vec<u8>> {
        let len = len.min(self.size as usize);
        self.with_mapping(false, |mapped| gather_copies(mapped, &[ByteCopy::at(0, len)]))
    }

    /// Raw handle
    pub fn handle(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Allocated size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Bank the block came from
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        unsafe {
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(flags: MemoryBankFlags) -> MemoryBank {
        MemoryBank {
            heap_index: 0,
            heap_size: 256 << 20,
            flags,
        }
    }

    fn typical_banks() -> Vec<MemoryBank> {
        vec![
            bank(MemoryBankFlags::DEVICE_LOCAL),
            bank(MemoryBankFlags::HOST_VISIBLE | MemoryBankFlags::HOST_COHERENT),
            bank(MemoryBankFlags::HOST_VISIBLE | MemoryBankFlags::HOST_COHERENT | MemoryBankFlags::HOST_CACHED),
            bank(MemoryBankFlags::DEVICE_LOCAL | MemoryBankFlags::HOST_VISIBLE | MemoryBankFlags::HOST_COHERENT),
        ]
    }

    /// Reference model: smallest qualifying index, checked exhaustively
    fn brute_force(banks: &[MemoryBank], required: MemoryBankFlags, type_bits: u32) -> Option<u32> {
        (0..banks.len() as u32).find(|&i| type_bits & (1 << i) != 0 && banks[i as usize].flags.contains(required))
    }

    #[test]
    fn test_first_fit_not_best_fit() {
        let banks = typical_banks();
        // bank 1 wins although bank 3 is also device-local
        assert_eq!(find_memory_index(&banks, MemoryBankFlags::HOST_VISIBLE, 0b1111), Some(1));
        assert_eq!(find_memory_index(&banks, MemoryBankFlags::DEVICE_LOCAL, 0b1111), Some(0));
    }

    #[test]
    fn test_type_bits_restrict_candidates() {
        let banks = typical_banks();
        assert_eq!(find_memory_index(&banks, MemoryBankFlags::HOST_VISIBLE, 0b1100), Some(2));
        assert_eq!(find_memory_index(&banks, MemoryBankFlags::DEVICE_LOCAL, 0b0110), None);
        assert_eq!(find_memory_index(&banks, MemoryBankFlags::empty(), 0), None);
    }

    #[test]
    fn test_empty_requirement_takes_first_candidate() {
        let banks = typical_banks();
        assert_eq!(find_memory_index(&banks, MemoryBankFlags::empty(), 0b1000), Some(3));
    }

    #[test]
    fn test_matches_reference_for_all_inputs() {
        let banks = typical_banks();
        for type_bits in 0..16u32 {
            for raw in 0..32u32 {
                let required = MemoryBankFlags::from_bits_truncate(raw);
                assert_eq!(
                    find_memory_index(&banks, required, type_bits),
                    brute_force(&banks, required, type_bits),
                    "required {required:?} type_bits {type_bits:#b}"
                );
            }
        }
    }

    #[test]
    fn test_allocator_wrappers() {
        let allocator = MemoryAllocator::new(typical_banks());
        assert_eq!(allocator.device_local(0b1111).unwrap(), 0);
        assert_eq!(allocator.host_visible(0b1111).unwrap(), 1);
        assert!(matches!(
            allocator.device_local(0b0110),
            Err(VulkanError::NoSuitableMemoryType { type_bits: 0b0110, .. })
        ));
    }

    #[test]
    fn test_vk_flag_conversion() {
        let vk_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::LAZILY_ALLOCATED;
        let flags = MemoryBankFlags::from(vk_flags);
        assert_eq!(flags, MemoryBankFlags::DEVICE_LOCAL | MemoryBankFlags::LAZILY_ALLOCATED);
        assert_eq!(vk::MemoryPropertyFlags::from(flags), vk_flags);
        assert_eq!(flags.describe(), "DEVICE_LOCAL | LAZILY_ALLOCATED");
    }

    #[test]
    fn test_from_properties() {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            memory_heap_count: 1,
            ..Default::default()
        };
        properties.memory_heaps[0].size = 1024;
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        let allocator = MemoryAllocator::from_properties(&properties);
        assert_eq!(allocator.banks().len(), 2);
        assert_eq!(allocator.banks()[1].heap_size, 1024);
        assert_eq!(allocator.host_visible(0b11).unwrap(), 1);
    }

    #[test]
    fn test_uniform_block_round_trip() {
        use crate::scene::MatrixBlock;
        let block = MatrixBlock {
            model: [[1.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0], [0.0, 0.0, 3.0, 0.0], [4.0, 5.0, 6.0, 1.0]],
            view: [[0.5; 4]; 4],
            projection: [[-1.25; 4]; 4],
            normal: [[f32::MIN_POSITIVE; 4]; 4],
        };
        let bytes = bytemuck::bytes_of(&block);
        // allocations are often rounded up past the block size
        let mut mapped = vec![0xCDu8; 512];
        let plan = [ByteCopy::at(0, bytes.len())];

        apply_copies(&mut mapped, &plan, bytes).unwrap();
        let read = gather_copies(&mapped, &plan).unwrap();

        assert_eq!(read.as_slice(), bytes);
        assert_eq!(bytemuck::pod_read_unaligned::<MatrixBlock>(&read), block);
        assert!(mapped[bytes.len()..].iter().all(|&b| b == 0xCD));
    }

    #[test]
    fn test_padded_rows_round_trip() {
        // 3 RGBA pixels per row, 16-byte pitch, rows start at 64
        let packed: Vec<u8> = (0..3 * 4 * 4).map(|i| i as u8).collect();
        let plan: Vec<ByteCopy> = (0..4).map(|y| ByteCopy { src: y * 12, dst: 64 + y * 16, len: 12 }).collect();
        let mut mapped = vec![0xEEu8; 64 + 4 * 16];

        apply_copies(&mut mapped, &plan, &packed).unwrap();

        assert_eq!(&mapped[64..76], &packed[0..12]);
        assert_eq!(&mapped[76..80], &[0xEE; 4], "row padding is left alone");
        assert_eq!(&mapped[80..92], &packed[12..24]);
        assert!(mapped[..64].iter().all(|&b| b == 0xEE));
        assert_eq!(gather_copies(&mapped, &plan).unwrap(), packed);
    }

    #[test]
    fn test_copy_past_the_mapping_is_rejected() {
        let mut mapped = vec![0u8; 16];
        let err = apply_copies(&mut mapped, &[ByteCopy::at(8, 12)], &[1; 12]).unwrap_err();
        assert!(matches!(err, VulkanError::SizeMismatch { expected: 16, actual: 20 }));
        assert!(apply_copies(&mut mapped, &[ByteCopy { src: 4, dst: 0, len: 12 }], &[1; 12]).is_err());
        assert!(gather_copies(&mapped, &[ByteCopy::at(10, 8)]).is_err());
    }
}
