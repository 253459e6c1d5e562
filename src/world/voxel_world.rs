//! In-memory voxel world: raw block, rotation and light arrays plus circuits
//!
//! Cells are stored x-major: index `(x * wy + y) * wz + z`.

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::observer::{Notifier, Subscription};
use crate::core::types::{IVec3, Result};
use crate::world::blockset::{BlockId, Blockset, ID_EMPTY};
use crate::world::circuit::{Circuit, NetId, NetValue};
use crate::world::events::{TransientKind, WorldEvent};

/// Light level given to cells outside the world and to a fresh world
pub const DEFAULT_LIGHT_OUTSIDE: u8 = 255;

/// A bounded box of voxels
#[derive(Debug)]
pub struct World {
    dims: IVec3,
    blocks: Vec<BlockId>,
    rotations: Vec<u8>,
    light: Vec<u8>,
    light_outside: u8,
    blockset: Blockset,
    circuits: HashMap<IVec3, Circuit>,
    notifier: Notifier<WorldEvent>,
}

impl World {
    /// Create an empty, fully lit world
    pub fn new(dims: IVec3, blockset: Blockset) -> Result<Self> {
        let volume = Self::checked_volume(dims)?;
        Ok(Self {
            dims,
            blocks: vec![ID_EMPTY; volume],
            rotations: vec![0; volume],
            light: vec![DEFAULT_LIGHT_OUTSIDE; volume],
            light_outside: DEFAULT_LIGHT_OUTSIDE,
            blockset,
            circuits: HashMap::new(),
            notifier: Notifier::new(),
        })
    }

    /// Create a world from existing raw arrays
    pub fn from_raw(
        dims: IVec3,
        blocks: Vec<BlockId>,
        rotations: Vec<u8>,
        light: Vec<u8>,
        light_outside: u8,
        blockset: Blockset,
    ) -> Result<Self> {
        let volume = Self::checked_volume(dims)?;
        let lengths = [
            ("blocks", blocks.len()),
            ("rotations", rotations.len()),
            ("light", light.len()),
        ];
        for (name, len) in lengths {
            if len != volume {
                return Err(Error::World(format!(
                    "{} array has {} cells, expected {}",
                    name, len, volume
                )));
            }
        }
        Ok(Self {
            dims,
            blocks,
            rotations,
            light,
            light_outside,
            blockset,
            circuits: HashMap::new(),
            notifier: Notifier::new(),
        })
    }

    fn checked_volume(dims: IVec3) -> Result<usize> {
        if dims.min_element() <= 0 {
            return Err(Error::World(format!("world dimensions must be positive, got {}", dims)));
        }
        let volume = dims.x as i64 * dims.y as i64 * dims.z as i64;
        usize::try_from(volume).map_err(|_| Error::World(format!("world {} is too large", dims)))
    }

    /// Size in cubes
    pub fn dims(&self) -> IVec3 {
        self.dims
    }

    pub fn in_bounds(&self, cube: IVec3) -> bool {
        cube.x >= 0
            && cube.x < self.dims.x
            && cube.y >= 0
            && cube.y < self.dims.y
            && cube.z >= 0
            && cube.z < self.dims.z
    }

    /// Index into the raw arrays. Only meaningful for in-bounds cubes.
    #[inline]
    pub fn raw_index(&self, cube: IVec3) -> usize {
        debug_assert!(self.in_bounds(cube), "cube {} outside world {}", cube, self.dims);
        ((cube.x * self.dims.y + cube.y) * self.dims.z + cube.z) as usize
    }

    pub fn raw_blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn raw_rotations(&self) -> &[u8] {
        &self.rotations
    }

    pub fn raw_light(&self) -> &[u8] {
        &self.light
    }

    /// Block at a cube; cubes outside the world are empty
    pub fn block_at(&self, cube: IVec3) -> BlockId {
        if self.in_bounds(cube) {
            self.blocks[self.raw_index(cube)]
        } else {
            ID_EMPTY
        }
    }

    /// Rotation code at a cube; 0 outside the world
    pub fn rotation_at(&self, cube: IVec3) -> u8 {
        if self.in_bounds(cube) {
            self.rotations[self.raw_index(cube)]
        } else {
            0
        }
    }

    /// Light at a cube; the outside level beyond the world
    pub fn light_at(&self, cube: IVec3) -> u8 {
        if self.in_bounds(cube) {
            self.light[self.raw_index(cube)]
        } else {
            self.light_outside
        }
    }

    pub fn light_outside(&self) -> u8 {
        self.light_outside
    }

    pub fn blockset(&self) -> &Blockset {
        &self.blockset
    }

    /// Mutable blockset access; its own notifications report table changes
    pub fn blockset_mut(&mut self) -> &mut Blockset {
        &mut self.blockset
    }

    /// Replace the blockset entirely
    pub fn set_blockset(&mut self, blockset: Blockset) {
        self.blockset = blockset;
        self.notifier.notify(&WorldEvent::BlocksetChanged);
    }

    /// Set a block. Returns false if the cube is outside the world or unchanged.
    pub fn set_block(&mut self, cube: IVec3, block: BlockId) -> bool {
        if !self.in_bounds(cube) {
            return false;
        }
        let index = self.raw_index(cube);
        if self.blocks[index] == block {
            return false;
        }
        self.blocks[index] = block;
        self.notifier.notify(&WorldEvent::BlockDirtied(cube));
        true
    }

    /// Set a block's rotation code
    pub fn set_rotation(&mut self, cube: IVec3, rotation: u8) -> bool {
        if !self.in_bounds(cube) {
            return false;
        }
        let index = self.raw_index(cube);
        if self.rotations[index] == rotation {
            return false;
        }
        self.rotations[index] = rotation;
        self.notifier.notify(&WorldEvent::BlockDirtied(cube));
        true
    }

    /// Set the light level of a cube
    pub fn set_light(&mut self, cube: IVec3, level: u8) -> bool {
        if !self.in_bounds(cube) {
            return false;
        }
        let index = self.raw_index(cube);
        if self.light[index] == level {
            return false;
        }
        self.light[index] = level;
        self.notifier.notify(&WorldEvent::BlockRelit(cube));
        true
    }

    /// Overwrite every light level without per-cube notifications
    pub fn fill_light(&mut self, level: u8) {
        self.light.fill(level);
        self.notifier.notify(&WorldEvent::DirtyAll);
    }

    /// Announce a visual effect for the block currently at `cube`.
    /// Emit `Destroy` before clearing a block and `Create` after placing one.
    pub fn emit_transient(&self, cube: IVec3, kind: TransientKind) {
        self.notifier.notify(&WorldEvent::Transient {
            cube,
            kind,
            block: self.block_at(cube),
            rotation: self.rotation_at(cube),
        });
    }

    /// Ask every renderer to rebuild everything
    pub fn invalidate_all(&self) {
        self.notifier.notify(&WorldEvent::DirtyAll);
    }

    /// Insert or replace a circuit
    pub fn set_circuit(&mut self, circuit: Circuit) {
        let origin = circuit.origin();
        self.circuits.insert(origin, circuit);
        self.notifier.notify(&WorldEvent::CircuitDirtied(origin));
    }

    pub fn remove_circuit(&mut self, origin: IVec3) -> Option<Circuit> {
        let removed = self.circuits.remove(&origin);
        if removed.is_some() {
            self.notifier.notify(&WorldEvent::CircuitDeleted(origin));
        }
        removed
    }

    pub fn circuit(&self, origin: IVec3) -> Option<&Circuit> {
        self.circuits.get(&origin)
    }

    pub fn circuits(&self) -> impl Iterator<Item = (&IVec3, &Circuit)> {
        self.circuits.iter()
    }

    /// Update a network value. Renderers read values at draw time, so no
    /// notification is sent.
    pub fn set_net_value(&mut self, origin: IVec3, net: NetId, value: NetValue) -> bool {
        match self.circuits.get_mut(&origin) {
            Some(circuit) => {
                circuit.set_net_value(net, value);
                true
            }
            None => false,
        }
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn listen<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&WorldEvent) + 'static,
    {
        self.notifier.listen(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }
}
