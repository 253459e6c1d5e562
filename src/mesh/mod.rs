//! Block data to renderable geometry

pub mod builder;

pub use builder::{build_chunk_mesh, MeshStats};
