//! Shaders, render pass and the graphics pipeline

pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod vertex_layout;

pub use pipeline::{FixedState, GraphicsPipeline, PipelineBuilder};
pub use render_pass::{external_dependencies, RenderPass};
pub use shader::ShaderModule;
