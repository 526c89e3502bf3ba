//! 2D images with dedicated memory and an optional view

use ash::{vk, Device};

use crate::render::backends::vulkan::memory::{DeviceMemory, MemoryAllocator, MemoryBankFlags};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Creation parameters for a single-mip, single-layer 2D image
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    /// Width and height
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Linear or optimal
    pub tiling: vk::ImageTiling,
    /// Usage bits
    pub usage: vk::ImageUsageFlags,
    /// UNDEFINED or PREINITIALIZED
    pub initial_layout: vk::ImageLayout,
    /// Bank flags the memory must carry
    pub memory: MemoryBankFlags,
}

/// Full color subresource of a single-mip image
pub const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Image plus its allocation and view, destroyed in reverse order on drop
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    view: Option<vk::ImageView>,
    memory: DeviceMemory,
    spec: ImageSpec,
}

impl GpuImage {
    /// Create the image, allocate and bind its memory
    pub fn new(device: &Device, allocator: &MemoryAllocator, spec: ImageSpec) -> VulkanResult<Self> {
        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: spec.extent.width,
                height: spec.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(spec.format)
            .tiling(spec.tiling)
            .initial_layout(spec.initial_layout)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&create_info, None).map_err(VulkanError::from)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let bound = allocator.allocate(device, requirements, spec.memory).and_then(|memory| unsafe {
            device
                .bind_image_memory(image, memory.handle(), 0)
                .map(|()| memory)
                .map_err(VulkanError::from)
        });
        let memory = match bound {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        log::debug!(
            "[MEMORY] Image {}x{} {:?} {:?}: {} bytes in bank {}",
            spec.extent.width,
            spec.extent.height,
            spec.format,
            spec.tiling,
            memory.size(),
            memory.memory_type_index()
        );

        Ok(Self {
            device: device.clone(),
            image,
            view: None,
            memory,
            spec,
        })
    }

    /// Create the image's 2D view with an identity swizzle
    pub fn create_view(&mut self, aspect_mask: vk::ImageAspectFlags) -> VulkanResult<vk::ImageView> {
        if let Some(view) = self.view {
            return Ok(view);
        }
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.spec.format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                ..COLOR_RANGE
            });

        let view = unsafe {
            self.device
                .create_image_view(&view_info, None)
                .map_err(VulkanError::from)?
        };
        self.view = Some(view);
        Ok(view)
    }

    /// Row pitch and offset of the color subresource (linear images only)
    pub fn subresource_layout(&self) -> vk::SubresourceLayout {
        let subresource = vk::ImageSubresource {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            array_layer: 0,
        };
        unsafe { self.device.get_image_subresource_layout(self.image, subresource) }
    }

    /// Raw image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View, once created
    pub fn view(&self) -> Option<vk::ImageView> {
        self.view
    }

    /// Backing memory
    pub fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    /// Creation parameters
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if let Some(view) = self.view.take() {
                self.device.destroy_image_view(view, None);
            }
            self.device.destroy_image(self.image, None);
        }
    }
}

/// Format of the shared depth/stencil attachment
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT_S8_UINT;

/// Depth/stencil attachment shared by both framebuffers
pub struct DepthStencilImage {
    image: GpuImage,
    view: vk::ImageView,
}

impl DepthStencilImage {
    /// Device-local, optimal tiling, viewed through its depth aspect
    pub fn new(device: &Device, allocator: &MemoryAllocator, extent: vk::Extent2D) -> VulkanResult<Self> {
        let mut image = GpuImage::new(
            device,
            allocator,
            ImageSpec {
                extent,
                format: DEPTH_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                initial_layout: vk::ImageLayout::UNDEFINED,
                memory: MemoryBankFlags::DEVICE_LOCAL,
            },
        )?;
        let view = image.create_view(vk::ImageAspectFlags::DEPTH)?;
        log::debug!("[SWAPCHAIN] Depth/stencil {}x{} {:?}", extent.width, extent.height, DEPTH_FORMAT);
        Ok(Self { image, view })
    }

    /// Depth view
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Format
    pub fn format(&self) -> vk::Format {
        self.image.spec().format
    }
}
