//! Debug overlays: world boundary lines and the texture allocation quad

use crate::core::types::IVec3;
use crate::render::backend::{DrawCommand, DrawKind, MeshData, MeshHandle, Primitive, RenderBackend};

/// How far boundary lines extend past the world on each side
pub const BOUNDARY_EXTENT: f32 = 20.0;

const BOUNDARY_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// The 12 edges of the world box, each extended by [`BOUNDARY_EXTENT`]
pub fn boundary_lines(dims: IVec3) -> MeshData {
    let size = dims.as_vec3().to_array();
    let mut mesh = MeshData::new(Primitive::Lines);

    for dim in 0..3 {
        let ud = (dim + 1) % 3;
        let vd = (dim + 2) % 3;
        for u in 0..2 {
            for v in 0..2 {
                let mut point = [0.0f32; 3];
                point[ud] = size[ud] * u as f32;
                point[vd] = size[vd] * v as f32;
                point[dim] = -BOUNDARY_EXTENT;
                mesh.positions.push(point);
                point[dim] = size[dim] + BOUNDARY_EXTENT;
                mesh.positions.push(point);
            }
        }
    }
    mesh.normals = vec![[0.0; 3]; mesh.positions.len()];
    mesh.colors = vec![BOUNDARY_COLOR; mesh.positions.len()];
    mesh
}

/// Full-screen quad in clip space showing the block texture atlas
pub fn texture_debug_quad() -> MeshData {
    let corners = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [-1.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
    let uvs = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];
    let order = [0, 1, 2, 2, 1, 3];

    let mut mesh = MeshData::new(Primitive::Triangles);
    mesh.positions = order.iter().map(|&i| corners[i]).collect();
    mesh.texcoords = order.iter().map(|&i| uvs[i]).collect();
    mesh.normals = vec![[0.0; 3]; order.len()];
    mesh
}

/// Lazily created overlay meshes
#[derive(Debug, Default)]
pub struct DebugOverlays {
    boundary: Option<(IVec3, MeshHandle)>,
    texture_quad: Option<MeshHandle>,
}

impl DebugOverlays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit the boundary lines for a world of `dims`, rebuilding when the size changed
    pub fn draw_boundaries<B: RenderBackend>(&mut self, backend: &mut B, dims: IVec3) {
        let mesh = match self.boundary {
            Some((built_for, handle)) if built_for == dims => handle,
            Some((_, handle)) => {
                backend.update_mesh(handle, &boundary_lines(dims));
                self.boundary = Some((dims, handle));
                handle
            }
            None => {
                let handle = backend.create_mesh("boundary_lines", &boundary_lines(dims));
                self.boundary = Some((dims, handle));
                handle
            }
        };
        backend.submit(DrawCommand { mesh, light_texture: None, kind: DrawKind::Overlay });
    }

    pub fn draw_texture_debug<B: RenderBackend>(&mut self, backend: &mut B) {
        let mesh = *self
            .texture_quad
            .get_or_insert_with(|| backend.create_mesh("texture_debug", &texture_debug_quad()));
        backend.submit(DrawCommand { mesh, light_texture: None, kind: DrawKind::ScreenOverlay });
    }

    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some((_, handle)) = self.boundary.take() {
            backend.destroy_mesh(handle);
        }
        if let Some(handle) = self.texture_quad.take() {
            backend.destroy_mesh(handle);
        }
    }
}
