//! Volumetric light data for chunks

pub mod light_texture;

pub use light_texture::{light_index, pack_light, LightTexture, LIGHT_TEXTURE_BYTES};
