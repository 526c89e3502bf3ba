//! Render context and the typed stages that build it.
//!
//! ```text
//! InstanceStage::new(config, window)   instance, debug messenger, surface
//!   .select_device()                   adapter, queue families, device, allocator
//!   .create_resources(scene)           texture upload, geometry, uniforms, descriptors
//!   .create_presentation()             swapchain, depth, render pass, framebuffers
//!   .build_pipeline()                  shaders, pipeline, frame renderer
//!   -> RenderContext
//! ```
//!
//! Each stage consumes the previous one, so nothing can be created before
//! what it depends on.

use ash::vk;

use crate::assets;
use crate::config::RendererConfig;
use crate::render::backends::vulkan::error::report_err;
use crate::render::backends::vulkan::frame::{FrameOutcome, FrameRenderer, FrameTargets, GeometryBuffers};
use crate::render::backends::vulkan::initialization::{DeviceContext, Surface, VulkanInstance};
use crate::render::backends::vulkan::presentation::PresentationSurface;
use crate::render::backends::vulkan::rendering::{GraphicsPipeline, PipelineBuilder, ShaderModule};
use crate::render::backends::vulkan::resources::{
    DescriptorBindings, GpuBuffer, SlotBindings, Texture, UniformBuffers, UploadTarget,
};
use crate::render::backends::vulkan::state::CommandPool;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::window::Window;
use crate::scene::{cube_indexed, cube_vertices, SceneState};

/// Instance and surface exist; the surface drops before the instance
pub struct InstanceStage {
    config: RendererConfig,
    surface: Surface,
    instance: VulkanInstance,
}

impl InstanceStage {
    /// Create the instance with the window system's extensions and a surface for `window`
    pub fn new(config: RendererConfig, window: &Window) -> VulkanResult<Self> {
        let window_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::should_exit(e.to_string()))?;
        let instance = VulkanInstance::new(&config, &window_extensions)?;

        let raw_surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::should_exit(e.to_string()))?;
        let surface = Surface::from_raw(&instance, raw_surface);

        Ok(Self {
            config,
            surface,
            instance,
        })
    }

    /// Pick the adapter and create the logical device
    pub fn select_device(self) -> VulkanResult<DeviceStage> {
        let context = DeviceContext::new(self.instance, self.surface, &self.config)?;
        Ok(DeviceStage {
            config: self.config,
            context,
        })
    }
}

/// Device and allocator exist
pub struct DeviceStage {
    config: RendererConfig,
    context: DeviceContext,
}

impl DeviceStage {
    /// The device context
    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Upload the texture, create geometry and uniform buffers, point the descriptor sets at them
    pub fn create_resources(self, scene: &SceneState) -> VulkanResult<ResourceStage> {
        let Self { config, context } = self;
        let device = context.device();
        let allocator = context.allocator();

        let upload_pool = CommandPool::new(device.clone(), context.upload_family())?;
        let pixels = assets::load_texture_file(&config.texture_path).map_err(|e| {
            log::error!("[TEXTURE] {}", e);
            VulkanError::from(e)
        })?;
        let texture = Texture::upload(
            device,
            allocator,
            &UploadTarget {
                pool: &upload_pool,
                queue: context.queue(),
            },
            pixels,
        )?;

        let vertices = cube_vertices();
        let (indexed_vertices, indices) = cube_indexed();
        let geometry = GeometryBuffers {
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
            vertices: GpuBuffer::vertex(device, allocator, &vertices)?,
            indexed_vertices: GpuBuffer::vertex(device, allocator, &indexed_vertices)?,
            indices: GpuBuffer::index(device, allocator, &indices)?,
        };

        let slots = config.frame_mode.frames_in_flight();
        let uniforms = UniformBuffers::new(device, allocator, slots, scene)?;
        let descriptors = DescriptorBindings::new(device, slots)?;
        for slot in 0..slots {
            let (matrices, misc) = uniforms.slot(slot)?;
            descriptors.write_slot(
                device,
                slot,
                &SlotBindings {
                    matrices,
                    light: uniforms.light(),
                    misc,
                    texture: &texture,
                },
            )?;
        }

        Ok(ResourceStage {
            config,
            resources: SceneResources {
                descriptors,
                uniforms,
                geometry,
                texture,
            },
            context,
        })
    }
}

/// GPU resources the scene draws with; fields drop top to bottom
struct SceneResources {
    descriptors: DescriptorBindings,
    uniforms: UniformBuffers,
    geometry: GeometryBuffers,
    texture: Texture,
}

/// Scene resources exist
pub struct ResourceStage {
    config: RendererConfig,
    resources: SceneResources,
    context: DeviceContext,
}

impl ResourceStage {
    /// Create the swapchain and everything sized by it
    pub fn create_presentation(self) -> VulkanResult<PresentationStage> {
        let wanted = vk::Extent2D {
            width: self.config.width,
            height: self.config.height,
        };
        let presentation = PresentationSurface::new(&self.context, wanted, self.config.frame_mode)?;
        Ok(PresentationStage {
            config: self.config,
            presentation,
            resources: self.resources,
            context: self.context,
        })
    }
}

/// Swapchain, render pass and framebuffers exist
pub struct PresentationStage {
    config: RendererConfig,
    presentation: PresentationSurface,
    resources: SceneResources,
    context: DeviceContext,
}

impl PresentationStage {
    /// Load the shaders, build the pipeline and the frame renderer
    pub fn build_pipeline(self) -> VulkanResult<RenderContext> {
        let Self {
            config,
            presentation,
            resources,
            context,
        } = self;
        let device = context.device();

        let vertex = ShaderModule::from_file(device, &config.shaders.vertex_shader_path, vk::ShaderStageFlags::VERTEX)?;
        let fragment =
            ShaderModule::from_file(device, &config.shaders.fragment_shader_path, vk::ShaderStageFlags::FRAGMENT)?;

        let layouts = resources.descriptors.layout_handles();
        let pipeline = PipelineBuilder::new(device, presentation.render_pass().handle(), presentation.extent(), &layouts)
            .build(&vertex, &fragment)?;
        // shader modules are no longer needed once the pipeline exists
        drop(vertex);
        drop(fragment);

        let graphics_pool = CommandPool::new(device.clone(), context.queue_families().graphics)?;
        let frame = FrameRenderer::new(device, graphics_pool, config.frame_mode)?;

        log::info!("[DEVICE] Render context ready on {}", context.adapter().name);

        Ok(RenderContext {
            frame,
            pipeline,
            presentation,
            resources,
            config,
            context,
        })
    }
}

/// Everything needed to draw the cube.
///
/// Fields drop in reverse creation order after the device has gone idle.
pub struct RenderContext {
    frame: FrameRenderer,
    pipeline: GraphicsPipeline,
    presentation: PresentationSurface,
    resources: SceneResources,
    config: RendererConfig,
    context: DeviceContext,
}

impl RenderContext {
    /// Run every stage in order
    pub fn new(config: RendererConfig, window: &Window, scene: &SceneState) -> VulkanResult<Self> {
        InstanceStage::new(config, window)?
            .select_device()?
            .create_resources(scene)?
            .create_presentation()?
            .build_pipeline()
    }

    /// Draw one frame of `scene`.
    ///
    /// Failures that are not fatal are logged and yield `Ok(None)`; fatal ones
    /// (device lost, setup failures) are returned.
    pub fn render_frame(&mut self, scene: &SceneState) -> VulkanResult<Option<FrameOutcome>> {
        let resources = &self.resources;
        let targets = FrameTargets {
            presentation: &self.presentation,
            pipeline: &self.pipeline,
            geometry: &resources.geometry,
            queue: self.context.queue(),
            clear_color: self.config.clear_color,
        };
        let draw = resources.geometry.draw_call(scene.use_index_buffer);

        let rendered = self.frame.render_frame(&targets, draw, scene.verbose, |slot| {
            resources.uniforms.write(slot, scene)?;
            resources.descriptors.sets(slot)
        });

        match rendered {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(report_err::<FrameOutcome>(Err(e), "[FRAME] Frame skipped")),
        }
    }

    /// Wait for the queue and the device to finish all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Device, adapter and allocator
    pub fn device_context(&self) -> &DeviceContext {
        &self.context
    }

    /// Swapchain and framebuffers
    pub fn presentation(&self) -> &PresentationSurface {
        &self.presentation
    }

    /// The sampled texture
    pub fn texture(&self) -> &Texture {
        &self.resources.texture
    }

    /// Configuration the context was built from
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Frame renderer
    pub fn frame_renderer(&self) -> &FrameRenderer {
        &self.frame
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::warn!("[DEVICE] Wait idle before teardown failed: {}", e);
        }
        log::debug!("[DEVICE] Tearing down render context");
    }
}
