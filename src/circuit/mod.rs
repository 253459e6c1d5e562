//! Rendering of circuit graphs

pub mod renderer;

pub use renderer::{beam_radius, net_color, CircuitRenderer, CYL_RESOLUTION, VERTICES_PER_EDGE};
