//! One framebuffer per swapchain image

use ash::{vk, Device};

use super::swapchain::IMAGE_COUNT;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a single-layer framebuffer over `attachments`
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&framebuffer_create_info, None)
                .map_err(VulkanError::from)?
        };

        Ok(Self {
            device: device.clone(),
            framebuffer,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Attachment list for framebuffer `i`: that image's view, then the shared depth view
pub fn attachments_for(
    color_views: &[vk::ImageView; IMAGE_COUNT],
    depth_view: vk::ImageView,
) -> [[vk::ImageView; 2]; IMAGE_COUNT] {
    color_views.map(|color| [color, depth_view])
}

/// Create both framebuffers
pub fn create_framebuffers(
    device: &Device,
    render_pass: vk::RenderPass,
    color_views: &[vk::ImageView; IMAGE_COUNT],
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
) -> VulkanResult<[Framebuffer; IMAGE_COUNT]> {
    let [first, second] = attachments_for(color_views, depth_view);
    // the first drops on its own if the second fails
    Ok([
        Framebuffer::new(device, render_pass, &first, extent)?,
        Framebuffer::new(device, render_pass, &second, extent)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_depth_view_is_shared() {
        let colors = [vk::ImageView::from_raw(1), vk::ImageView::from_raw(2)];
        let depth = vk::ImageView::from_raw(9);
        let sets = attachments_for(&colors, depth);
        assert_eq!(sets[0], [colors[0], depth]);
        assert_eq!(sets[1], [colors[1], depth]);
    }
}
