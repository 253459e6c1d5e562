//! Block types, their rotated face geometry, and the shared texture atlas

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::observer::{Notifier, Subscription};
use crate::core::types::{Result, Vec3};
use crate::world::rotation::{CubeRotation, Face, ROTATION_COUNT};

/// Index into a blockset's type table, as stored in raw world arrays
pub type BlockId = u8;

/// Air. Never meshed.
pub const ID_EMPTY: BlockId = 0;
/// Placeholder type, also used for references to types the table doesn't have
pub const ID_BOGUS: BlockId = 1;

/// First id available to user-defined types
pub const FIRST_USER_ID: BlockId = 2;

/// Description of one block type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockType {
    pub name: String,
    /// Opaque blocks hide the faces of adjacent opaque blocks
    pub opaque: bool,
    /// Atlas tile used on every face
    pub tile: u32,
}

impl BlockType {
    pub fn new(name: impl Into<String>, opaque: bool, tile: u32) -> Self {
        Self {
            name: name.into(),
            opaque,
            tile,
        }
    }
}

/// Layout of the texture atlas shared by all block faces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureAtlas {
    /// Pixels per tile edge
    pub tile_size: u32,
    /// Tiles per atlas row
    pub tiles_per_row: u32,
}

impl TextureAtlas {
    /// Texture coordinate rectangle `(u0, v0, u1, v1)` of a tile
    pub fn tile_uv(&self, tile: u32) -> (f32, f32, f32, f32) {
        let per_row = self.tiles_per_row.max(1);
        let step = 1.0 / per_row as f32;
        let u0 = (tile % per_row) as f32 * step;
        let v0 = (tile / per_row) as f32 * step;
        (u0, v0, u0 + step, v0 + step)
    }
}

impl Default for TextureAtlas {
    fn default() -> Self {
        Self {
            tile_size: 16,
            tiles_per_row: 16,
        }
    }
}

/// Triangles of one block face, relative to the block's low corner
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceGeometry {
    pub positions: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
}

impl FaceGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// The six faces of a block under one rotation, indexed by [`Face::index`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RotatedFaces {
    pub faces: [FaceGeometry; 6],
}

impl RotatedFaces {
    pub fn face(&self, face: Face) -> &FaceGeometry {
        &self.faces[face.index()]
    }
}

/// Change notifications from a blockset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlocksetEvent {
    /// Atlas layout or tile assignment changed
    TexturingChanged,
    /// A type was added or replaced
    TableChanged,
}

/// The table of block types a world is built from
#[derive(Debug)]
pub struct Blockset {
    types: Vec<BlockType>,
    atlas: TextureAtlas,
    /// Per id, per rotation code
    rotated_faces: Vec<Vec<RotatedFaces>>,
    opacity: Vec<bool>,
    notifier: Notifier<BlocksetEvent>,
}

impl Blockset {
    /// Build a blockset. `types` receive ids starting at [`FIRST_USER_ID`];
    /// ids 0 and 1 are always the empty and placeholder types.
    pub fn new(atlas: TextureAtlas, types: Vec<BlockType>) -> Self {
        let mut all = Vec::with_capacity(types.len() + 2);
        all.push(BlockType::new("empty", false, 0));
        all.push(BlockType::new("bogus", true, 0));
        all.extend(types);

        let mut blockset = Self {
            types: all,
            atlas,
            rotated_faces: Vec::new(),
            opacity: Vec::new(),
            notifier: Notifier::new(),
        };
        blockset.rebuild_tables();
        blockset
    }

    /// Number of defined ids, including empty and bogus
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.len() <= FIRST_USER_ID as usize
    }

    pub fn block_type(&self, id: BlockId) -> Option<&BlockType> {
        self.types.get(id as usize)
    }

    pub fn atlas(&self) -> TextureAtlas {
        self.atlas
    }

    pub fn tile_size(&self) -> u32 {
        self.atlas.tile_size
    }

    /// Opacity by id. Ids outside the table are not opaque.
    pub fn is_opaque(&self, id: BlockId) -> bool {
        self.opacity.get(id as usize).copied().unwrap_or(false)
    }

    /// Opacity of every defined id, for hot loops
    pub fn opacity_table(&self) -> &[bool] {
        &self.opacity
    }

    /// Face geometry for a block under a rotation.
    ///
    /// Unknown ids get the placeholder geometry and unknown rotation codes the
    /// identity, so a damaged world still renders.
    pub fn face_data(&self, id: BlockId, rotation: u8) -> &RotatedFaces {
        let per_rotation = match self.rotated_faces.get(id as usize) {
            Some(table) if !table.is_empty() => table,
            _ => &self.rotated_faces[ID_BOGUS as usize],
        };
        let code = CubeRotation::by_code_or_identity(rotation).code() as usize;
        &per_rotation[code]
    }

    /// Define or replace a user type. An id one past the end appends.
    pub fn set_block_type(&mut self, id: BlockId, block_type: BlockType) -> Result<()> {
        let index = id as usize;
        if id < FIRST_USER_ID {
            return Err(Error::World(format!("block id {} is reserved", id)));
        }
        if index > self.types.len() {
            return Err(Error::World(format!(
                "block id {} leaves a gap after {} types",
                id,
                self.types.len()
            )));
        }
        if index == self.types.len() {
            self.types.push(block_type);
        } else {
            self.types[index] = block_type;
        }
        self.rebuild_tables();
        self.notifier.notify(&BlocksetEvent::TableChanged);
        Ok(())
    }

    /// Swap the atlas layout
    pub fn retexture(&mut self, atlas: TextureAtlas) {
        self.atlas = atlas;
        self.rebuild_tables();
        self.notifier.notify(&BlocksetEvent::TexturingChanged);
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BlocksetEvent) + 'static,
    {
        self.notifier.listen(listener)
    }

    fn rebuild_tables(&mut self) {
        let atlas = self.atlas;
        self.opacity = self.types.iter().map(|t| t.opaque).collect();
        self.rotated_faces = self
            .types
            .iter()
            .enumerate()
            .map(|(id, t)| {
                if id == ID_EMPTY as usize {
                    Vec::new()
                } else {
                    rotated_unit_cube(&atlas, t.tile)
                }
            })
            .collect();
        debug_assert_eq!(self.rotated_faces[ID_BOGUS as usize].len(), ROTATION_COUNT);
    }
}

/// Corners of each unrotated face, counter-clockwise seen from outside
fn face_corners(face: Face) -> [Vec3; 4] {
    let v = Vec3::new;
    match face {
        Face::LowX => [v(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0), v(0.0, 1.0, 1.0), v(0.0, 1.0, 0.0)],
        Face::HighX => [v(1.0, 0.0, 1.0), v(1.0, 0.0, 0.0), v(1.0, 1.0, 0.0), v(1.0, 1.0, 1.0)],
        Face::LowY => [v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(1.0, 0.0, 1.0), v(0.0, 0.0, 1.0)],
        Face::HighY => [v(0.0, 1.0, 1.0), v(1.0, 1.0, 1.0), v(1.0, 1.0, 0.0), v(0.0, 1.0, 0.0)],
        Face::LowZ => [v(1.0, 0.0, 0.0), v(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(1.0, 1.0, 0.0)],
        Face::HighZ => [v(0.0, 0.0, 1.0), v(1.0, 0.0, 1.0), v(1.0, 1.0, 1.0), v(0.0, 1.0, 1.0)],
    }
}

fn unit_face(face: Face, rotation: &CubeRotation, uv: (f32, f32, f32, f32)) -> FaceGeometry {
    let (u0, v0, u1, v1) = uv;
    let corners = face_corners(face).map(|c| rotation.transform_point(c).to_array());
    let tex = [[u0, v1], [u1, v1], [u1, v0], [u0, v0]];

    // Two triangles: 0-1-2, 2-3-0
    let order = [0, 1, 2, 2, 3, 0];
    FaceGeometry {
        positions: order.iter().map(|&i| corners[i]).collect(),
        texcoords: order.iter().map(|&i| tex[i]).collect(),
    }
}

fn rotated_unit_cube(atlas: &TextureAtlas, tile: u32) -> Vec<RotatedFaces> {
    let uv = atlas.tile_uv(tile);
    CubeRotation::all()
        .map(|rotation| RotatedFaces {
            faces: Face::ALL.map(|face| unit_face(face, &rotation, uv)),
        })
        .collect()
}
