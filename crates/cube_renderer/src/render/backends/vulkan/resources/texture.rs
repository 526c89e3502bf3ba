//! Staged texture upload.
//!
//! Pixels go into a linear, host-visible staging image, then a single command
//! buffer moves them into an optimal, device-local image:
//!
//! 1. staging PREINITIALIZED -> TRANSFER_SRC_OPTIMAL
//! 2. final PREINITIALIZED -> TRANSFER_DST_OPTIMAL
//! 3. copy staging -> final, full extent
//! 4. final TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL
//!
//! The host waits for the queue to drain before the view is created, so the
//! final image is never sampled before step 4 has executed. The staging image
//! and its memory are released when the upload returns, on every path.

use ash::{vk, Device};

use super::image::{GpuImage, ImageSpec, COLOR_RANGE};
use crate::assets::ImageData;
use crate::render::backends::vulkan::memory::{ByteCopy, MemoryAllocator, MemoryBankFlags};
use crate::render::backends::vulkan::state::{CommandPool, CommandRecorder};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Format of both the staging and the sampled image; matches the decoders' RGBA output
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

const BYTES_PER_PIXEL: usize = 4;

/// Layout states of the sampled image, in the only order they may occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TextureLayout {
    /// Freshly created
    Preinitialized,
    /// Ready to receive the copy
    TransferDestination,
    /// Ready for sampling
    ShaderReadOnly,
}

impl TextureLayout {
    /// Matching Vulkan layout
    pub fn vk_layout(self) -> vk::ImageLayout {
        match self {
            Self::Preinitialized => vk::ImageLayout::PREINITIALIZED,
            Self::TransferDestination => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Preinitialized => Some(Self::TransferDestination),
            Self::TransferDestination => Some(Self::ShaderReadOnly),
            Self::ShaderReadOnly => None,
        }
    }
}

/// Tracks the sampled image's layout and refuses out-of-order transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureLayoutTracker {
    history: Vec<TextureLayout>,
}

impl Default for TextureLayoutTracker {
    fn default() -> Self {
        Self {
            history: vec![TextureLayout::Preinitialized],
        }
    }
}

impl TextureLayoutTracker {
    /// Current layout
    pub fn current(&self) -> TextureLayout {
        self.history.last().copied().unwrap_or(TextureLayout::Preinitialized)
    }

    /// Move to `to`, which must be the direct successor of the current layout.
    ///
    /// Returns the `(old, new)` Vulkan layouts for the barrier.
    pub fn transition(&mut self, to: TextureLayout) -> VulkanResult<(vk::ImageLayout, vk::ImageLayout)> {
        let from = self.current();
        if from.next() != Some(to) {
            return Err(VulkanError::InvalidOperation {
                reason: format!("texture layout transition {from:?} -> {to:?} is out of order"),
            });
        }
        self.history.push(to);
        Ok((from.vk_layout(), to.vk_layout()))
    }

    /// Sampling is only legal once the last transition is recorded
    pub fn is_sampleable(&self) -> bool {
        self.current() == TextureLayout::ShaderReadOnly
    }

    /// Every layout visited, oldest first
    pub fn history(&self) -> &[TextureLayout] {
        &self.history
    }
}

/// Copies that move tightly packed rows into a staging image with `row_pitch` bytes per row.
///
/// A single bulk copy when the pitch equals the packed row size, one copy per row otherwise.
pub fn plan_row_copies(width: u32, height: u32, row_pitch: u64, base_offset: u64) -> Vec<ByteCopy> {
    let packed = width as usize * BYTES_PER_PIXEL;
    let (pitch, base) = (row_pitch as usize, base_offset as usize);
    if pitch == packed {
        vec![ByteCopy {
            src: 0,
            dst: base,
            len: packed * height as usize,
        }]
    } else {
        (0..height as usize)
            .map(|y| ByteCopy {
                src: y * packed,
                dst: base + y * pitch,
                len: packed,
            })
            .collect()
    }
}

fn layout_barrier(
    image: vk::Image,
    (old_layout, new_layout): (vk::ImageLayout, vk::ImageLayout),
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_RANGE)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build()
}

/// Sampler wrapper with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering, repeat addressing, single mip, no anisotropy
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .mip_lod_bias(0.0)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { device.create_sampler(&create_info, None).map_err(VulkanError::from)? };
        Ok(Self {
            device: device.clone(),
            sampler,
        })
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// A sampled texture in SHADER_READ_ONLY_OPTIMAL layout
pub struct Texture {
    sampler: Sampler,
    image: GpuImage,
    view: vk::ImageView,
    width: u32,
    height: u32,
    layout: TextureLayoutTracker,
}

/// Where upload commands are recorded and submitted
pub struct UploadTarget<'a> {
    /// Pool the one-shot command buffer comes from
    pub pool: &'a CommandPool,
    /// Queue the upload is submitted to
    pub queue: vk::Queue,
}

impl Texture {
    /// Run the staged upload. `pixels` is consumed and released once the copy has completed.
    pub fn upload(
        device: &Device,
        allocator: &MemoryAllocator,
        target: &UploadTarget<'_>,
        pixels: ImageData,
    ) -> VulkanResult<Self> {
        let expected = pixels.width as usize * pixels.height as usize * BYTES_PER_PIXEL;
        if pixels.channels as usize != BYTES_PER_PIXEL || pixels.data.len() != expected {
            return Err(VulkanError::SizeMismatch {
                expected: expected as u64,
                actual: pixels.data.len() as u64,
            });
        }
        let extent = vk::Extent2D {
            width: pixels.width,
            height: pixels.height,
        };

        // staging image: linear, host-visible, filled row by row when padded
        let staging = GpuImage::new(
            device,
            allocator,
            ImageSpec {
                extent,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::LINEAR,
                usage: vk::ImageUsageFlags::TRANSFER_SRC,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
                memory: MemoryBankFlags::HOST_VISIBLE,
            },
        )?;
        let subresource = staging.subresource_layout();
        let plan = plan_row_copies(extent.width, extent.height, subresource.row_pitch, subresource.offset);
        log::debug!(
            "[TEXTURE] Staging {}x{}: row pitch {} vs packed {}, {} copy op(s)",
            extent.width,
            extent.height,
            subresource.row_pitch,
            extent.width as usize * BYTES_PER_PIXEL,
            plan.len()
        );
        staging.memory().write_regions(&plan, &pixels.data)?;

        // final image: optimal, device-local
        let mut image = GpuImage::new(
            device,
            allocator,
            ImageSpec {
                extent,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                initial_layout: vk::ImageLayout::PREINITIALIZED,
                memory: MemoryBankFlags::DEVICE_LOCAL,
            },
        )?;

        // barriers and copy, then drain the queue
        let mut layout = TextureLayoutTracker::default();
        let command_buffer = target.pool.allocate_array::<1>()?[0];
        let recorded = Self::record_copy(device, command_buffer, &staging, &image, extent, &mut layout)
            .and_then(|cb| target.pool.submit_and_wait_idle(target.queue, cb));
        target.pool.free(&[command_buffer]);
        recorded?;

        // staging and pixels are released once the view exists
        let view = image.create_view(vk::ImageAspectFlags::COLOR)?;
        let sampler = Sampler::new(device)?;
        drop(staging);
        drop(pixels);

        log::info!(
            "[TEXTURE] Uploaded {}x{} texture, layouts {:?}",
            extent.width,
            extent.height,
            layout.history()
        );

        Ok(Self {
            sampler,
            image,
            view,
            width: extent.width,
            height: extent.height,
            layout,
        })
    }

    fn record_copy(
        device: &Device,
        command_buffer: vk::CommandBuffer,
        staging: &GpuImage,
        image: &GpuImage,
        extent: vk::Extent2D,
        layout: &mut TextureLayoutTracker,
    ) -> VulkanResult<vk::CommandBuffer> {
        let mut recorder = CommandRecorder::new(command_buffer, device.clone());
        recorder.begin()?;

        let staging_barrier = layout_barrier(
            staging.handle(),
            (vk::ImageLayout::PREINITIALIZED, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
            vk::AccessFlags::HOST_WRITE,
            vk::AccessFlags::TRANSFER_READ,
        );
        let final_barrier = layout_barrier(
            image.handle(),
            layout.transition(TextureLayout::TransferDestination)?,
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
        );
        recorder.image_barriers(
            vk::PipelineStageFlags::HOST,
            vk::PipelineStageFlags::TRANSFER,
            &[staging_barrier, final_barrier],
        )?;

        let layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let region = vk::ImageCopy {
            src_subresource: layers,
            src_offset: vk::Offset3D::default(),
            dst_subresource: layers,
            dst_offset: vk::Offset3D::default(),
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };
        recorder.copy_image(
            staging.handle(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        )?;

        let read_barrier = layout_barrier(
            image.handle(),
            layout.transition(TextureLayout::ShaderReadOnly)?,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
        );
        recorder.image_barriers(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[read_barrier],
        )?;

        recorder.end()
    }

    /// Descriptor info for a combined image sampler
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Width and height
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Layout history of the sampled image
    pub fn layout(&self) -> &TextureLayoutTracker {
        &self.layout
    }

    /// Sampled image handle
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_order_is_enforced() {
        let mut tracker = TextureLayoutTracker::default();
        assert!(!tracker.is_sampleable());
        assert!(tracker.transition(TextureLayout::ShaderReadOnly).is_err());

        let (old, new) = tracker.transition(TextureLayout::TransferDestination).unwrap();
        assert_eq!(old, vk::ImageLayout::PREINITIALIZED);
        assert_eq!(new, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert!(!tracker.is_sampleable());

        let (old, new) = tracker.transition(TextureLayout::ShaderReadOnly).unwrap();
        assert_eq!(old, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(new, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert!(tracker.is_sampleable());

        assert_eq!(
            tracker.history(),
            &[
                TextureLayout::Preinitialized,
                TextureLayout::TransferDestination,
                TextureLayout::ShaderReadOnly
            ]
        );
    }

    #[test]
    fn test_no_transition_after_final() {
        let mut tracker = TextureLayoutTracker::default();
        tracker.transition(TextureLayout::TransferDestination).unwrap();
        tracker.transition(TextureLayout::ShaderReadOnly).unwrap();
        assert!(tracker.transition(TextureLayout::TransferDestination).is_err());
        assert!(tracker.transition(TextureLayout::ShaderReadOnly).is_err());
        assert_eq!(tracker.current(), TextureLayout::ShaderReadOnly);
    }

    #[test]
    fn test_repeat_transition_is_rejected() {
        let mut tracker = TextureLayoutTracker::default();
        tracker.transition(TextureLayout::TransferDestination).unwrap();
        assert!(tracker.transition(TextureLayout::TransferDestination).is_err());
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn test_packed_rows_are_one_copy() {
        let plan = plan_row_copies(64, 64, 256, 0);
        assert_eq!(
            plan,
            vec![ByteCopy {
                src: 0,
                dst: 0,
                len: 64 * 64 * 4
            }]
        );
    }

    #[test]
    fn test_padded_rows_are_copied_individually() {
        let plan = plan_row_copies(3, 4, 16, 64);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0], ByteCopy { src: 0, dst: 64, len: 12 });
        assert_eq!(plan[3], ByteCopy { src: 36, dst: 64 + 48, len: 12 });
        assert!(plan.iter().all(|c| c.len == 12));
    }

    #[test]
    fn test_plan_covers_every_source_byte_once() {
        let plan = plan_row_copies(5, 7, 32, 0);
        let total: usize = plan.iter().map(|c| c.len).sum();
        assert_eq!(total, 5 * 7 * 4);
        for pair in plan.windows(2) {
            assert_eq!(pair[0].src + pair[0].len, pair[1].src);
            assert_eq!(pair[1].dst - pair[0].dst, 32);
        }
    }

    #[test]
    fn test_staged_rows_match_packed_pixels() {
        use crate::render::backends::vulkan::memory::{apply_copies, gather_copies};
        let (width, height, pitch, offset) = (5u32, 3u32, 32u64, 16u64);
        let pixels: Vec<u8> = (0..width * height * 4).map(|i| (i * 7) as u8).collect();
        let plan = plan_row_copies(width, height, pitch, offset);
        let mut staging = vec![0u8; (offset + pitch * u64::from(height)) as usize];

        apply_copies(&mut staging, &plan, &pixels).unwrap();

        for y in 0..height as usize {
            let row = &staging[16 + y * 32..16 + y * 32 + 20];
            assert_eq!(row, &pixels[y * 20..(y + 1) * 20]);
            assert!(staging[16 + y * 32 + 20..16 + (y + 1) * 32].iter().all(|&b| b == 0));
        }
        assert_eq!(gather_copies(&staging, &plan).unwrap(), pixels);
    }
}
