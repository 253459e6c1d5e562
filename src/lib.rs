//! Voxstream - chunked streaming renderer for voxel worlds

pub mod core;
pub mod math;
pub mod world;
pub mod mesh;
pub mod lighting;
pub mod render;
pub mod circuit;
pub mod particles;
pub mod streaming;
