//! Distance-driven chunk streaming around a viewer

pub mod chunk;
pub mod cache;
pub mod priority;
pub mod distance;
pub mod budget;
pub mod config;
pub mod events;
pub mod controller;

pub use chunk::{dist_sq, Chunk, ChunkKey, DirtyKind, CHUNK_SIZE, LIGHT_TEXTURE_SIZE};
pub use cache::ChunkIndex;
pub use priority::DirtyQueue;
pub use distance::{RenderDistanceCache, RenderDistanceInfo, MAX_RENDER_DISTANCE};
pub use budget::FrameBudget;
pub use config::{RenderConfig, RenderSettings};
pub use events::{Inbox, RenderEvent};
pub use controller::{DrawReport, StreamState, StreamStats, TickReport, WorldRenderer};
