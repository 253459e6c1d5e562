//! Interleaved vertex format uploaded by the wgpu backend

use bytemuck::{Pod, Zeroable};

use crate::render::backend::MeshData;

/// One vertex as the chunk, circuit and particle shaders read it.
/// 48 bytes: position, normal, texcoord, rgba.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub color: [f32; 4],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Interleave separate attribute streams. Missing streams are filled
    /// with zeros, missing colors with opaque white.
    pub fn interleave(mesh: &MeshData) -> Vec<MeshVertex> {
        mesh.positions
            .iter()
            .enumerate()
            .map(|(i, &position)| MeshVertex {
                position,
                normal: mesh.normals.get(i).copied().unwrap_or_default(),
                texcoord: mesh.texcoords.get(i).copied().unwrap_or_default(),
                color: mesh.colors.get(i).copied().unwrap_or([1.0; 4]),
            })
            .collect()
    }
}
