//! Rendering backends and debug overlays

pub mod backend;
pub mod gpu;
pub mod headless;
pub mod overlay;
pub mod vertex;

pub use backend::{
    ContextTicket, DrawCommand, DrawKind, MeshData, MeshHandle, Primitive, RenderBackend,
    TextureHandle,
};
pub use gpu::WgpuBackend;
pub use headless::{HeadlessBackend, HeadlessStats};
pub use overlay::DebugOverlays;
pub use vertex::MeshVertex;
