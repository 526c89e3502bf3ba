//! Swapchain, depth attachment and framebuffers

pub mod framebuffer;
pub mod swapchain;

pub use framebuffer::Framebuffer;
pub use swapchain::{check_image_count, select_present_mode, Swapchain, IMAGE_COUNT};

use ash::vk;

use crate::render::backends::vulkan::initialization::DeviceContext;
use crate::config::FrameMode;
use crate::render::backends::vulkan::rendering::{external_dependencies, RenderPass};
use crate::render::backends::vulkan::resources::DepthStencilImage;
use crate::render::backends::vulkan::VulkanResult;

/// The two presentable images, their framebuffers and the shared depth attachment.
///
/// Fields drop in declaration order: framebuffers, render pass, depth, swapchain.
pub struct PresentationSurface {
    framebuffers: [Framebuffer; IMAGE_COUNT],
    render_pass: RenderPass,
    depth: DepthStencilImage,
    swapchain: Swapchain,
}

impl PresentationSurface {
    /// Build the swapchain at `wanted` size, then its depth attachment, render pass and framebuffers.
    ///
    /// `mode` decides whether the render pass carries external dependencies.
    pub fn new(context: &DeviceContext, wanted: vk::Extent2D, mode: FrameMode) -> VulkanResult<Self> {
        let device = context.device();
        let swapchain = Swapchain::new(context, wanted)?;
        let extent = swapchain.extent();
        let depth = DepthStencilImage::new(device, context.allocator(), extent)?;
        let render_pass = RenderPass::new(
            device,
            swapchain.format().format,
            depth.format(),
            &external_dependencies(mode),
        )?;
        let framebuffers =
            framebuffer::create_framebuffers(device, render_pass.handle(), swapchain.views(), depth.view(), extent)?;

        log::info!(
            "[SWAPCHAIN] Presentation ready: {} images, {}x{}",
            IMAGE_COUNT,
            extent.width,
            extent.height
        );

        Ok(Self {
            framebuffers,
            render_pass,
            depth,
            swapchain,
        })
    }

    /// The swapchain
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Render pass the framebuffers were built for
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    /// Framebuffer paired with swapchain image `index`
    pub fn framebuffer(&self, index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index).map(Framebuffer::handle)
    }

    /// Shared depth attachment
    pub fn depth(&self) -> &DepthStencilImage {
        &self.depth
    }

    /// Render extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}
