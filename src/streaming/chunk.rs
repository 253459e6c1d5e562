//! Chunk keys and per-chunk render state

use crate::core::types::{IVec3, Vec3};
use crate::lighting::LightTexture;
use crate::math::Aabb;
use crate::mesh::{build_chunk_mesh, MeshStats};
use crate::render::backend::{
    DrawCommand, DrawKind, MeshData, MeshHandle, RenderBackend, TextureHandle,
};
use crate::world::World;

/// Edge of a chunk's light volume
pub const LIGHT_TEXTURE_SIZE: usize = 16;

/// Chunk edge length in cubes. One cube of light padding on each side
/// fills the light volume exactly.
pub const CHUNK_SIZE: i32 = LIGHT_TEXTURE_SIZE as i32 - 2;

/// Origin of a chunk. Every component is a multiple of [`CHUNK_SIZE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    x: i32,
    y: i32,
    z: i32,
}

impl ChunkKey {
    /// Key of the chunk containing a cube
    pub fn containing(cube: IVec3) -> Self {
        let s = CHUNK_SIZE;
        Self {
            x: cube.x - cube.x.rem_euclid(s),
            y: cube.y - cube.y.rem_euclid(s),
            z: cube.z - cube.z.rem_euclid(s),
        }
    }

    /// Key of the chunk containing a world-space point
    pub fn from_view_position(position: Vec3) -> Self {
        let s = CHUNK_SIZE as f32;
        let snapped = (position / s).floor() * s;
        Self {
            x: snapped.x.round() as i32,
            y: snapped.y.round() as i32,
            z: snapped.z.round() as i32,
        }
    }

    /// Key from an origin that is already aligned
    pub fn from_origin(origin: IVec3) -> Option<Self> {
        let key = Self::containing(origin);
        (key.origin() == origin).then_some(key)
    }

    pub fn origin(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Key displaced by a whole number of chunks
    pub fn offset_by_chunks(&self, chunks: IVec3) -> Self {
        let d = chunks * CHUNK_SIZE;
        Self {
            x: self.x + d.x,
            y: self.y + d.y,
            z: self.z + d.z,
        }
    }

    /// Key displaced by an aligned cube offset
    pub fn offset(&self, offset: IVec3) -> Self {
        debug_assert_eq!(Self::containing(offset).origin(), offset, "unaligned chunk offset");
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
            z: self.z + offset.z,
        }
    }

    /// Squared distance between origins
    pub fn dist_sq(&self, other: &ChunkKey) -> i64 {
        dist_sq(self.origin(), other.origin())
    }

    /// Whether any part of the chunk overlaps a world of `dims`
    pub fn intersects_world(&self, dims: IVec3) -> bool {
        let s = CHUNK_SIZE;
        self.x >= 0
            && self.x - s < dims.x
            && self.y >= 0
            && self.y - s < dims.y
            && self.z >= 0
            && self.z - s < dims.z
    }

    /// Exclusive upper corner clipped to the world
    pub fn limit(&self, dims: IVec3) -> IVec3 {
        (self.origin() + IVec3::splat(CHUNK_SIZE)).min(dims)
    }
}

/// Squared Euclidean distance between integer points. Saturates at
/// `i64::MAX` for points near opposite ends of the `i32` range.
pub fn dist_sq(a: IVec3, b: IVec3) -> i64 {
    let d = a.as_i64vec3() - b.as_i64vec3();
    d.x.saturating_mul(d.x)
        .saturating_add(d.y.saturating_mul(d.y))
        .saturating_add(d.z.saturating_mul(d.z))
}

/// Which aspects of a chunk need rebuilding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyKind {
    Geometry,
    Lighting,
}

/// Cached render state of one chunk
#[derive(Debug)]
pub struct Chunk {
    key: ChunkKey,
    limit: IVec3,
    aabb: Aabb,
    mesh: Option<MeshHandle>,
    nonempty: bool,
    light: LightTexture,
    pub dirty_geometry: bool,
    pub dirty_lighting: bool,
}

impl Chunk {
    /// Create a chunk and build its geometry and lighting
    pub fn build<B: RenderBackend>(
        key: ChunkKey,
        world: &World,
        backend: &mut B,
        scratch: &mut MeshData,
    ) -> Self {
        let limit = key.limit(world.dims());
        let mut chunk = Self {
            key,
            limit,
            aabb: Aabb::from_cube_range(key.origin(), limit),
            mesh: None,
            nonempty: false,
            light: LightTexture::new(),
            dirty_geometry: false,
            dirty_lighting: false,
        };
        chunk.rebuild_geometry(world, backend, scratch);
        chunk.rebuild_lighting(world, backend);
        chunk
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Whether the most recent geometry build produced any vertices
    pub fn is_nonempty(&self) -> bool {
        self.nonempty
    }

    pub fn mesh(&self) -> Option<MeshHandle> {
        self.mesh
    }

    pub fn set_dirty(&mut self, kind: DirtyKind) {
        match kind {
            DirtyKind::Geometry => self.dirty_geometry = true,
            DirtyKind::Lighting => self.dirty_lighting = true,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_geometry || self.dirty_lighting
    }

    /// Re-mesh from the world. Returns the build counters.
    pub fn rebuild_geometry<B: RenderBackend>(
        &mut self,
        world: &World,
        backend: &mut B,
        scratch: &mut MeshData,
    ) -> MeshStats {
        let stats = build_chunk_mesh(world, self.key.origin(), self.limit, scratch);
        self.nonempty = !scratch.is_empty();
        match self.mesh {
            Some(handle) => backend.update_mesh(handle, scratch),
            None => {
                let label = format!("chunk_{}_{}_{}", self.key.x, self.key.y, self.key.z);
                self.mesh = Some(backend.create_mesh(&label, scratch));
            }
        }
        log::trace!(
            "Meshed chunk {:?}: {} faces, {} culled",
            self.key.origin(),
            stats.faces,
            stats.culled_faces
        );
        stats
    }

    pub fn rebuild_lighting<B: RenderBackend>(&mut self, world: &World, backend: &mut B) {
        self.light.refresh(world, self.key.origin(), self.limit, backend);
    }

    /// Rebuild whichever aspects are flagged and clear the flags.
    /// Returns whether the geometry was rebuilt.
    pub fn rebuild_dirty<B: RenderBackend>(
        &mut self,
        world: &World,
        backend: &mut B,
        scratch: &mut MeshData,
    ) -> bool {
        let geometry = self.dirty_geometry;
        if self.dirty_geometry {
            self.dirty_geometry = false;
            self.rebuild_geometry(world, backend, scratch);
        }
        if self.dirty_lighting {
            self.dirty_lighting = false;
            self.rebuild_lighting(world, backend);
        }
        geometry
    }

    /// Light texture valid in the backend's current context
    pub fn light_texture<B: RenderBackend>(&mut self, backend: &mut B) -> TextureHandle {
        self.light.get(backend)
    }

    pub fn light(&self) -> &LightTexture {
        &self.light
    }

    /// Submit the chunk's mesh with a current light texture
    pub fn draw<B: RenderBackend>(&mut self, backend: &mut B) {
        let Some(mesh) = self.mesh else {
            return;
        };
        let light = self.light.get(backend);
        backend.submit(DrawCommand {
            mesh,
            light_texture: Some(light),
            kind: DrawKind::Chunk,
        });
    }

    /// Destroy backend resources. The chunk is unusable afterwards.
    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(mesh) = self.mesh.take() {
            backend.destroy_mesh(mesh);
        }
        self.light.release(backend);
        self.nonempty = false;
    }
}
