//! Circuit beams: a thin cylinder per circuit edge, colored by its net value

use crate::core::types::{IVec3, Vec3};
use crate::render::backend::{DrawCommand, DrawKind, MeshData, MeshHandle, Primitive, RenderBackend};
use crate::world::{Circuit, NetId, NetValue};

/// Quads around each cylinder
pub const CYL_RESOLUTION: usize = 9;

/// Vertices emitted per circuit edge
pub const VERTICES_PER_EDGE: usize = 6 * CYL_RESOLUTION;

const BEAM_ALPHA: f32 = 0.5;
const BLOCK_CENTER: Vec3 = Vec3::splat(0.5);

/// Beam radius in cubes, snapped to whole texels
pub fn beam_radius(tile_size: u32) -> f32 {
    let tile = tile_size.max(1) as f32;
    (0.08 * tile).round() / tile
}

/// Display color for a net value
pub fn net_color(value: &NetValue) -> [f32; 4] {
    let [r, g, b] = match value {
        NetValue::Undefined => [0.0, 0.0, 0.0],
        NetValue::Bool(false) => [0.0, 0.0, 0.2],
        NetValue::Bool(true) => [0.2, 0.2, 1.0],
        NetValue::Number(v) if *v <= 1.0 => [*v as f32, 0.0, 0.0],
        NetValue::Number(v) => [1.0, (1.0 - 1.0 / *v) as f32, 0.0],
        NetValue::Other(_) => [1.0, 1.0, 1.0],
    };
    [r, g, b, BEAM_ALPHA]
}

/// Append an open cylinder from `from` to `to`. Returns the vertex count.
pub fn push_cylinder(from: Vec3, to: Vec3, radius: f32, out: &mut MeshData) -> usize {
    let axis = to - from;
    let helper = if axis.y != 0.0 { Vec3::X } else { Vec3::Y };
    let perp1 = axis.cross(helper).normalize_or_zero();
    let perp2 = perp1.cross(axis).normalize_or_zero();

    let around = |i: usize| {
        let angle = (i % CYL_RESOLUTION) as f32 / CYL_RESOLUTION as f32 * std::f32::consts::TAU;
        perp1 * angle.sin() + perp2 * angle.cos()
    };

    for i in 0..CYL_RESOLUTION {
        let d1 = around(i);
        let d2 = around(i + 1);
        let v0 = from + d2 * radius;
        let v1 = to + d2 * radius;
        let v2 = to + d1 * radius;
        let v3 = from + d1 * radius;
        for (vertex, normal) in [(v0, d2), (v1, d2), (v2, d1), (v2, d1), (v3, d1), (v0, d2)] {
            out.positions.push(vertex.to_array());
            out.normals.push(normal.to_array());
        }
    }
    VERTICES_PER_EDGE
}

/// Vertex range of one edge within the batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EdgeSpan {
    net: NetId,
    start: usize,
    count: usize,
}

/// Mesh of one circuit with per-edge live colors
#[derive(Debug)]
pub struct CircuitRenderer {
    origin: IVec3,
    mesh: Option<MeshHandle>,
    spans: Vec<EdgeSpan>,
    colors: Vec<[f32; 4]>,
}

impl CircuitRenderer {
    pub fn new<B: RenderBackend>(circuit: &Circuit, tile_size: u32, backend: &mut B) -> Self {
        let mut renderer = Self {
            origin: circuit.origin(),
            mesh: None,
            spans: Vec::new(),
            colors: Vec::new(),
        };
        renderer.recompute(circuit, tile_size, backend);
        renderer
    }

    pub fn origin(&self) -> IVec3 {
        self.origin
    }

    pub fn vertex_count(&self) -> usize {
        self.colors.len()
    }

    /// Rebuild the cylinders after the circuit's edges changed
    pub fn recompute<B: RenderBackend>(
        &mut self,
        circuit: &Circuit,
        tile_size: u32,
        backend: &mut B,
    ) {
        let radius = beam_radius(tile_size);
        let mut mesh = MeshData::new(Primitive::Triangles);
        self.spans.clear();

        for edge in circuit.edges() {
            let start = mesh.vertex_count();
            let count = push_cylinder(
                edge.from.as_vec3() + BLOCK_CENTER,
                edge.to.as_vec3() + BLOCK_CENTER,
                radius,
                &mut mesh,
            );
            self.spans.push(EdgeSpan { net: edge.net, start, count });
        }
        mesh.colors = vec![[1.0; 4]; mesh.vertex_count()];
        self.colors.clone_from(&mesh.colors);

        match self.mesh {
            Some(handle) => backend.update_mesh(handle, &mesh),
            None => {
                let origin = self.origin;
                let label = format!("circuit_{}_{}_{}", origin.x, origin.y, origin.z);
                self.mesh = Some(backend.create_mesh(&label, &mesh));
            }
        }
        log::debug!("Built circuit at {} with {} edges", self.origin, self.spans.len());
    }

    /// Re-read every edge's net value and upload the colors
    pub fn refresh_colors<B: RenderBackend>(&mut self, circuit: &Circuit, backend: &mut B) {
        for span in &self.spans {
            let color = net_color(&circuit.net_value(span.net));
            self.colors[span.start..span.start + span.count].fill(color);
        }
        if let Some(handle) = self.mesh {
            backend.update_colors(handle, &self.colors);
        }
    }

    /// Refresh colors and submit
    pub fn draw<B: RenderBackend>(&mut self, circuit: &Circuit, backend: &mut B) {
        self.refresh_colors(circuit, backend);
        if let Some(mesh) = self.mesh {
            backend.submit(DrawCommand { mesh, light_texture: None, kind: DrawKind::Circuit });
        }
    }

    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(handle) = self.mesh.take() {
            backend.destroy_mesh(handle);
        }
        self.spans.clear();
        self.colors.clear();
    }
}
