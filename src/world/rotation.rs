//! Discrete cube rotations and face directions
//!
//! A block's orientation is stored as a one-byte code selecting one of the 48
//! signed axis permutations (24 proper rotations plus their mirror images).

use crate::core::types::{IVec3, Vec3};

/// Number of distinct rotation codes
pub const ROTATION_COUNT: usize = 48;

/// Axis permutations, indexed by `code / 8`
const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// The six faces of a cube, in the order face tables are stored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    LowX,
    LowY,
    LowZ,
    HighX,
    HighY,
    HighZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::LowX,
        Face::LowY,
        Face::LowZ,
        Face::HighX,
        Face::HighY,
        Face::HighZ,
    ];

    /// Outward unit normal of the unrotated face
    pub fn normal(self) -> IVec3 {
        match self {
            Face::LowX => IVec3::NEG_X,
            Face::LowY => IVec3::NEG_Y,
            Face::LowZ => IVec3::NEG_Z,
            Face::HighX => IVec3::X,
            Face::HighY => IVec3::Y,
            Face::HighZ => IVec3::Z,
        }
    }

    /// Position in face tables
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One of the 48 orientations of a cube
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CubeRotation {
    code: u8,
    permutation: [usize; 3],
    signs: [i32; 3],
}

impl CubeRotation {
    pub const IDENTITY: CubeRotation = CubeRotation {
        code: 0,
        permutation: [0, 1, 2],
        signs: [1, 1, 1],
    };

    /// Look up a rotation by its stored code
    pub fn by_code(code: u8) -> Option<CubeRotation> {
        let code_usize = code as usize;
        if code_usize >= ROTATION_COUNT {
            return None;
        }
        let permutation = PERMUTATIONS[code_usize / 8];
        let bits = code_usize % 8;
        let sign = |bit: usize| if bits & (1 << bit) != 0 { -1 } else { 1 };
        Some(CubeRotation {
            code,
            permutation,
            signs: [sign(0), sign(1), sign(2)],
        })
    }

    /// Look up a rotation, treating unknown codes as the identity
    pub fn by_code_or_identity(code: u8) -> CubeRotation {
        Self::by_code(code).unwrap_or(Self::IDENTITY)
    }

    /// Every rotation, ordered by code
    pub fn all() -> impl Iterator<Item = CubeRotation> {
        (0..ROTATION_COUNT as u8).filter_map(CubeRotation::by_code)
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    /// Rotate an integer direction
    pub fn transform_vector(&self, v: IVec3) -> IVec3 {
        let a = v.to_array();
        IVec3::new(
            self.signs[0] * a[self.permutation[0]],
            self.signs[1] * a[self.permutation[1]],
            self.signs[2] * a[self.permutation[2]],
        )
    }

    /// Rotate a point within the unit cube about the cube's center
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let a = (p - Vec3::splat(0.5)).to_array();
        Vec3::new(
            self.signs[0] as f32 * a[self.permutation[0]],
            self.signs[1] as f32 * a[self.permutation[1]],
            self.signs[2] as f32 * a[self.permutation[2]],
        ) + Vec3::splat(0.5)
    }

    /// Direction the given unrotated face points after rotation
    pub fn face_normal(&self, face: Face) -> IVec3 {
        self.transform_vector(face.normal())
    }

    pub fn nx(&self) -> IVec3 {
        self.face_normal(Face::LowX)
    }

    pub fn ny(&self) -> IVec3 {
        self.face_normal(Face::LowY)
    }

    pub fn nz(&self) -> IVec3 {
        self.face_normal(Face::LowZ)
    }

    pub fn px(&self) -> IVec3 {
        self.face_normal(Face::HighX)
    }

    pub fn py(&self) -> IVec3 {
        self.face_normal(Face::HighY)
    }

    pub fn pz(&self) -> IVec3 {
        self.face_normal(Face::HighZ)
    }
}

impl Default for CubeRotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}
