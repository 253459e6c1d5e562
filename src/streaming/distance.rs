//! Chunk visibility thresholds derived from the render distance

use crate::core::types::IVec3;
use crate::streaming::chunk::{dist_sq, CHUNK_SIZE};

/// Largest render distance honored. Larger values, infinity included, are
/// clamped to it; NaN and negative values count as zero.
pub const MAX_RENDER_DISTANCE: f32 = 512.0;

/// Everything the controller needs to know about one render distance
#[derive(Clone, Debug, PartialEq)]
pub struct RenderDistanceInfo {
    /// Distance as requested, before clamping
    pub render_distance: f32,
    /// Render distance in whole chunks, rounded up
    pub chunk_distance: i32,
    /// Chunks closer than this are built. The extra chunk accounts for the
    /// origin sitting at a chunk corner.
    pub add_distance_sq: i64,
    /// Chunks farther than this are dropped
    pub drop_distance_sq: i64,
    /// Aligned offsets of every chunk within the add distance, nearest first
    pub near_chunk_order: Vec<IVec3>,
}

impl RenderDistanceInfo {
    pub fn compute(render_distance: f32) -> Self {
        let s = CHUNK_SIZE as f64;
        let d = render_distance.max(0.0).min(MAX_RENDER_DISTANCE) as f64;
        let chunk_distance = (d / s).ceil() as i32;
        let add_distance_sq = ((d + s) * (d + s)) as i64;
        let drop_distance_sq = ((d + 2.0 * s) * (d + 2.0 * s)) as i64;

        let mut near_chunk_order = Vec::new();
        for x in -chunk_distance - 1..=chunk_distance {
            for y in -chunk_distance - 1..=chunk_distance {
                for z in -chunk_distance - 1..=chunk_distance {
                    let offset = IVec3::new(x, y, z) * CHUNK_SIZE;
                    if dist_sq(offset, IVec3::ZERO) <= add_distance_sq {
                        near_chunk_order.push(offset);
                    }
                }
            }
        }
        // Stable sort keeps generation order among equal distances
        near_chunk_order.sort_by_key(|o| dist_sq(*o, IVec3::ZERO));

        Self {
            render_distance,
            chunk_distance,
            add_distance_sq,
            drop_distance_sq,
            near_chunk_order,
        }
    }
}

/// One-entry memo of [`RenderDistanceInfo::compute`]
#[derive(Debug, Default)]
pub struct RenderDistanceCache {
    last: Option<RenderDistanceInfo>,
    computed: usize,
}

impl RenderDistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, render_distance: f32) -> &RenderDistanceInfo {
        let fresh = matches!(
            &self.last,
            Some(info) if info.render_distance.to_bits() == render_distance.to_bits()
        );
        if !fresh {
            log::debug!("Building render distance info for {:.1}", render_distance);
            self.computed += 1;
            self.last = Some(RenderDistanceInfo::compute(render_distance));
        }
        self.last.get_or_insert_with(|| RenderDistanceInfo::compute(render_distance))
    }

    /// How many times the info was rebuilt
    pub fn computed(&self) -> usize {
        self.computed
    }
}
