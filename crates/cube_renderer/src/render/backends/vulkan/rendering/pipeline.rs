//! Fixed-function graphics pipeline for the cube.
//!
//! Culling stays off: the projection flips Y to reach Vulkan clip space, which
//! also flips winding, so back-face culling would discard the front faces.

use ash::{vk, Device};

use super::shader::ShaderModule;
use super::vertex_layout;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// The fixed state the builder bakes into every pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedState {
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Fill mode
    pub polygon_mode: vk::PolygonMode,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Winding treated as front-facing
    pub front_face: vk::FrontFace,
    /// Depth test and write
    pub depth_test: bool,
    /// Depth comparison
    pub depth_compare: vk::CompareOp,
    /// Stencil test
    pub stencil_test: bool,
    /// Color blending
    pub blend: bool,
    /// Channels written
    pub color_write_mask: vk::ColorComponentFlags,
}

impl Default for FixedState {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_compare: vk::CompareOp::LESS,
            stencil_test: false,
            blend: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }
    }
}

/// Viewport and scissor covering the whole render target
pub fn full_viewport(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    (
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        },
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        },
    )
}

/// Pipeline layout wrapper with RAII cleanup
pub struct PipelineLayout {
    device: Device,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Layout over `set_layouts` with no push constants
    pub fn new(device: &Device, set_layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::from)?
        };
        Ok(Self {
            device: device.clone(),
            layout,
        })
    }

    /// Get layout handle
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Graphics pipeline plus its layout
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: PipelineLayout,
    state: FixedState,
}

impl GraphicsPipeline {
    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    /// Fixed state the pipeline was built with
    pub fn state(&self) -> &FixedState {
        &self.state
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
        // layout drops after the pipeline
    }
}

/// Collects the inputs of the cube pipeline and builds it
pub struct PipelineBuilder<'a> {
    device: &'a Device,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    set_layouts: &'a [vk::DescriptorSetLayout],
    state: FixedState,
}

impl<'a> PipelineBuilder<'a> {
    /// Start from the fixed cube state
    pub fn new(
        device: &'a Device,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        set_layouts: &'a [vk::DescriptorSetLayout],
    ) -> Self {
        Self {
            device,
            render_pass,
            extent,
            set_layouts,
            state: FixedState::default(),
        }
    }

    /// State that will be baked in
    pub fn state(&self) -> &FixedState {
        &self.state
    }

    /// Build with the given vertex and fragment modules
    pub fn build(self, vertex: &ShaderModule, fragment: &ShaderModule) -> VulkanResult<GraphicsPipeline> {
        let state = self.state;
        let shader_stages = [vertex.stage_info(), fragment.stage_info()];

        let bindings = [vertex_layout::binding_description()];
        let attributes = vertex_layout::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(state.topology)
            .primitive_restart_enable(false);

        let (viewport, scissor) = full_viewport(self.extent);
        let viewports = [viewport];
        let scissors = [scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(state.polygon_mode)
            .line_width(1.0)
            .cull_mode(state.cull_mode)
            .front_face(state.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let keep = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::NEVER,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(state.depth_test)
            .depth_write_enable(state.depth_test)
            .depth_compare_op(state.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(state.stencil_test)
            .front(keep)
            .back(keep)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(state.color_write_mask)
            .blend_enable(state.blend)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout = PipelineLayout::new(self.device, self.set_layouts)?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, err)| {
                    log::error!("[PIPELINE] vkCreateGraphicsPipelines failed: {:?}", err);
                    VulkanError::from(err)
                })?
        };
        let pipeline = pipelines.first().copied().ok_or_else(|| {
            VulkanError::InitializationFailed("driver returned no graphics pipeline".to_string())
        })?;

        log::info!(
            "[PIPELINE] Graphics pipeline ready: {} set layouts, {}x{} viewport",
            self.set_layouts.len(),
            self.extent.width,
            self.extent.height
        );

        Ok(GraphicsPipeline {
            device: self.device.clone(),
            pipeline,
            layout,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_state_for_flipped_projection() {
        let state = FixedState::default();
        assert_eq!(state.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
    }

    #[test]
    fn test_depth_on_stencil_and_blend_off() {
        let state = FixedState::default();
        assert!(state.depth_test);
        assert_eq!(state.depth_compare, vk::CompareOp::LESS);
        assert!(!state.stencil_test);
        assert!(!state.blend);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn test_viewport_covers_extent() {
        let (viewport, scissor) = full_viewport(vk::Extent2D { width: 1024, height: 768 });
        assert_eq!(viewport.width, 1024.0);
        assert_eq!(viewport.height, 768.0);
        assert_eq!(viewport.max_depth, 1.0);
        assert_eq!(scissor.offset.x, 0);
        assert_eq!(scissor.extent.height, 768);
    }
}
