//! Vertex layout and uniform data shared with the shaders

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// 2D position with an RGB colour
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 2],
    /// Linear RGB colour
    pub color: [f32; 3],
}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    /// Single interleaved binding at slot 0
    pub const fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// `location = 0` position, `location = 1` colour
    pub const fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

/// Model, view and projection matrices, column-major
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MvpUniform {
    /// Model matrix
    pub model: [[f32; 4]; 4],
    /// View matrix
    pub view: [[f32; 4]; 4],
    /// Projection matrix
    pub proj: [[f32; 4]; 4],
}

impl MvpUniform {
    /// Size in bytes as seen by the descriptor
    pub const SIZE: vk::DeviceSize = size_of::<Self>() as vk::DeviceSize;

    const IDENTITY: [[f32; 4]; 4] = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
}

impl Default for MvpUniform {
    fn default() -> Self {
        Self {
            model: Self::IDENTITY,
            view: Self::IDENTITY,
            proj: Self::IDENTITY,
        }
    }
}
