//! GPU resources: host-visible buffers, images, the staged texture and descriptors

pub mod buffer;
pub mod descriptor_set;
pub mod image;
pub mod texture;
pub mod uniforms;

pub use buffer::GpuBuffer;
pub use descriptor_set::{DescriptorBindings, SlotBindings, SET_COUNT};
pub use image::{DepthStencilImage, GpuImage, ImageSpec, DEPTH_FORMAT};
pub use texture::{Sampler, Texture, TextureLayout, TextureLayoutTracker, UploadTarget, TEXTURE_FORMAT};
pub use uniforms::UniformBuffers;
