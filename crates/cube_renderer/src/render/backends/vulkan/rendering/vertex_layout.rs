//! Vertex input description for the scene's [`Vertex`] record

use ash::vk;
use std::mem::{offset_of, size_of};

use crate::scene::Vertex;

/// Single interleaved binding
pub fn binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Position, normal, color, texture coordinate at locations 0..=3
pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
    let attribute = |location: u32, format: vk::Format, offset: usize| vk::VertexInputAttributeDescription {
        binding: 0,
        location,
        format,
        offset: offset as u32,
    };
    [
        attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
        attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
        attribute(2, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
        attribute(3, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
    ]
}
