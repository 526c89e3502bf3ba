//! Double-buffered swapchain.
//!
//! The swapchain is asked for exactly two images and refuses anything else,
//! so every per-image array in the renderer is a `[_; 2]`.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::backends::vulkan::initialization::DeviceContext;
use crate::render::backends::vulkan::resources::image::COLOR_RANGE;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Presentable images in the swapchain
pub const IMAGE_COUNT: usize = 2;

/// Present modes in order of preference
pub const PRESENT_MODE_PREFERENCE: [vk::PresentModeKHR; 4] = [
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::FIFO,
    vk::PresentModeKHR::FIFO_RELAXED,
    vk::PresentModeKHR::IMMEDIATE,
];

/// First mode of [`PRESENT_MODE_PREFERENCE`] the surface supports
pub fn select_present_mode(supported: &[vk::PresentModeKHR]) -> Option<vk::PresentModeKHR> {
    PRESENT_MODE_PREFERENCE
        .into_iter()
        .find(|mode| supported.contains(mode))
}

/// Fail unless the driver handed back exactly two images
pub fn check_image_count(count: usize) -> VulkanResult<()> {
    if count == IMAGE_COUNT {
        Ok(())
    } else {
        Err(VulkanError::should_exit(format!(
            "swapchain returned {count} images, double buffering needs exactly {IMAGE_COUNT}"
        )))
    }
}

/// B8G8R8A8_SRGB with a nonlinear sRGB color space, else the first reported format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// Current extent, or `wanted` clamped to the surface limits when the surface leaves it undefined
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, wanted: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: wanted.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: wanted.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Swapchain with its two images and views, destroyed on drop
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    views: [vk::ImageView; IMAGE_COUNT],
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create the swapchain for the context's surface at `wanted` size
    pub fn new(context: &DeviceContext, wanted: vk::Extent2D) -> VulkanResult<Self> {
        let physical_device = context.adapter().handle;
        let surface = context.surface();

        let capabilities = surface.capabilities(physical_device)?;
        let format = choose_surface_format(&surface.formats(physical_device)?)
            .ok_or_else(|| VulkanError::should_exit("surface reports no formats"))?;
        let present_modes = surface.present_modes(physical_device)?;
        let present_mode = select_present_mode(&present_modes).ok_or_else(|| {
            VulkanError::should_exit(format!("no usable present mode among {present_modes:?}"))
        })?;
        let extent = choose_extent(&capabilities, wanted);

        log::info!(
            "[SWAPCHAIN] {:?}/{:?}, {:?}, {}x{} (surface allows {}..{} images)",
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height,
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(IMAGE_COUNT as u32)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain_loader = context.swapchain_loader().clone();
        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::from)?
        };

        let destroy_on_error = |e: VulkanError| {
            unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
            e
        };

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::from)
            .and_then(|images| {
                check_image_count(images.len())?;
                Ok([images[0], images[1]])
            })
            .map_err(destroy_on_error)?;

        let device = context.device().clone();
        let views = Self::create_views(&device, &images, format.format).map_err(destroy_on_error)?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            views,
            format,
            extent,
            present_mode,
        })
    }

    fn create_views(
        device: &Device,
        images: &[vk::Image; IMAGE_COUNT],
        format: vk::Format,
    ) -> VulkanResult<[vk::ImageView; IMAGE_COUNT]> {
        let create_view = |image: vk::Image| {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::R,
                    g: vk::ComponentSwizzle::G,
                    b: vk::ComponentSwizzle::B,
                    a: vk::ComponentSwizzle::A,
                })
                .subresource_range(COLOR_RANGE);
            unsafe { device.create_image_view(&create_info, None) }.map_err(VulkanError::from)
        };

        let first = create_view(images[0])?;
        match create_view(images[1]) {
            Ok(second) => Ok([first, second]),
            Err(e) => {
                unsafe { device.destroy_image_view(first, None) };
                Err(e)
            }
        }
    }

    /// Acquire the next image, waiting without a timeout.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> VulkanResult<(usize, bool)> {
        let (index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
                .map_err(VulkanError::from)?
        };
        let index = index as usize;
        if index >= IMAGE_COUNT {
            return Err(VulkanError::InvalidOperation {
                reason: format!("acquired image index {index} outside the double buffer"),
            });
        }
        Ok((index, suboptimal))
    }

    /// Queue image `index` for presentation after `wait` semaphores signal.
    ///
    /// Returns whether the swapchain is suboptimal.
    pub fn present(&self, queue: vk::Queue, index: usize, wait: &[vk::Semaphore]) -> VulkanResult<bool> {
        let swapchains = [self.swapchain];
        let indices = [index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe {
            self.swapchain_loader
                .queue_present(queue, &present_info)
                .map_err(VulkanError::from)
        }
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Chosen present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// One view per image
    pub fn views(&self) -> &[vk::ImageView; IMAGE_COUNT] {
        &self.views
    }

}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("[SWAPCHAIN] Swapchain destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_preference_order() {
        use vk::PresentModeKHR as M;
        assert_eq!(select_present_mode(&[M::FIFO, M::MAILBOX]), Some(M::MAILBOX));
        assert_eq!(select_present_mode(&[M::IMMEDIATE, M::FIFO]), Some(M::FIFO));
        assert_eq!(select_present_mode(&[M::IMMEDIATE, M::FIFO_RELAXED]), Some(M::FIFO_RELAXED));
        assert_eq!(select_present_mode(&[M::IMMEDIATE]), Some(M::IMMEDIATE));
    }

    #[test]
    fn test_present_mode_none_when_unsupported() {
        assert_eq!(select_present_mode(&[]), None);
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::SHARED_DEMAND_REFRESH]),
            None
        );
    }

    #[test]
    fn test_image_count_must_be_two() {
        assert!(check_image_count(2).is_ok());
        for count in [0, 1, 3, 4] {
            let err = check_image_count(count).unwrap_err();
            assert!(err.is_fatal(), "count {count} should be fatal");
        }
    }

    #[test]
    fn test_surface_format_preference() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb]), Some(srgb));
        assert_eq!(choose_surface_format(&[unorm]), Some(unorm));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_extent_uses_current_when_defined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 800, height: 600 },
            ..Default::default()
        };
        let wanted = vk::Extent2D { width: 1024, height: 1024 };
        assert_eq!(choose_extent(&capabilities, wanted), capabilities.current_extent);
    }

    #[test]
    fn test_extent_clamped_when_undefined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 512, height: 4096 },
            ..Default::default()
        };
        let wanted = vk::Extent2D { width: 1024, height: 1024 };
        assert_eq!(
            choose_extent(&capabilities, wanted),
            vk::Extent2D { width: 512, height: 1024 }
        );
    }
}
