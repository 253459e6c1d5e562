//! Axis-aligned bounding box

use crate::core::types::{IVec3, Vec3};

/// Bounds of a chunk or view region, in world units
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box spanning the integer cube range `[min, max)`
    pub fn from_cube_range(min: IVec3, max: IVec3) -> Self {
        Self {
            min: min.as_vec3(),
            max: max.as_vec3(),
        }
    }

    /// True if the box has no volume, as for a chunk clipped entirely by the world edge
    pub fn is_empty(&self) -> bool {
        self.max.cmple(self.min).any()
    }

    /// Touching boxes count as intersecting
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Corner furthest along `direction`
    pub fn furthest_corner(&self, direction: Vec3) -> Vec3 {
        Vec3::select(direction.cmpge(Vec3::ZERO), self.max, self.min)
    }
}
