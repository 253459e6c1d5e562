//! Interface between the streaming engine and whatever owns GPU resources
//!
//! Every resource created through a backend is owned by exactly one chunk,
//! circuit renderer, particle system or overlay, and is destroyed in place by
//! its owner.

use crate::math::Aabb;

/// Geometry buffer owned by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// Light volume texture owned by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Generation of the rendering context. Textures created under an older
/// ticket are gone and must be re-created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextTicket(pub u64);

/// How vertices are assembled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Primitive {
    #[default]
    Triangles,
    Lines,
    Points,
}

/// What a draw is for, so the host can pick pipeline state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawKind {
    /// Textured, lit terrain
    Chunk,
    /// Vertex-colored circuit beams
    Circuit,
    /// Block fragments
    Particles,
    /// World-space debug lines
    Overlay,
    /// Screen-space debug quad
    ScreenOverlay,
}

/// CPU-side geometry in separate attribute streams
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub primitive: Primitive,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Empty for vertex-colored meshes
    pub texcoords: Vec<[f32; 2]>,
    /// Empty for textured meshes
    pub colors: Vec<[f32; 4]>,
}

impl MeshData {
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Drop all vertices, keeping allocations
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.texcoords.clear();
        self.colors.clear();
    }
}

/// One submitted draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub mesh: MeshHandle,
    pub light_texture: Option<TextureHandle>,
    pub kind: DrawKind,
}

/// GPU resource management and draw submission
pub trait RenderBackend {
    /// Upload geometry into a new buffer
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle;

    /// Replace a buffer's geometry
    fn update_mesh(&mut self, handle: MeshHandle, mesh: &MeshData);

    /// Rewrite the color stream of an existing buffer; `colors` has one entry per vertex
    fn update_colors(&mut self, handle: MeshHandle, colors: &[[f32; 4]]);

    fn destroy_mesh(&mut self, handle: MeshHandle);

    /// Create a light volume from packed `L * L * L` bytes
    fn create_light_texture(&mut self, data: &[u8]) -> TextureHandle;

    fn update_light_texture(&mut self, handle: TextureHandle, data: &[u8]);

    fn destroy_texture(&mut self, handle: TextureHandle);

    /// Current context generation
    fn context_ticket(&self) -> ContextTicket;

    /// Conservative visibility test against the current view
    fn aabb_in_view(&self, aabb: &Aabb) -> bool;

    /// Queue a draw for this frame
    fn submit(&mut self, command: DrawCommand);
}
