//! The world and blockset collaborators the renderer reads from

pub mod blockset;
pub mod circuit;
pub mod events;
pub mod rotation;
pub mod voxel_world;

pub use blockset::{
    BlockId, BlockType, Blockset, BlocksetEvent, FaceGeometry, RotatedFaces, TextureAtlas,
    ID_BOGUS, ID_EMPTY,
};
pub use circuit::{Circuit, CircuitEdge, NetId, NetValue};
pub use events::{TransientKind, WorldEvent};
pub use rotation::{CubeRotation, Face};
pub use voxel_world::{World, DEFAULT_LIGHT_OUTSIDE};
