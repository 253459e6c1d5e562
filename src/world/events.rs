//! Notifications a world pushes to its renderers

use crate::core::types::IVec3;
use crate::world::blockset::BlockId;

/// Short-lived effect requested for a cube
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransientKind {
    Create,
    Destroy,
}

/// A change to a world
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// Shape or type of the block at this cube changed
    BlockDirtied(IVec3),
    /// Light level at this cube changed
    BlockRelit(IVec3),
    /// Circuit with this origin was created or rewired
    CircuitDirtied(IVec3),
    /// Circuit with this origin no longer exists
    CircuitDeleted(IVec3),
    /// Everything must be rebuilt
    DirtyAll,
    /// The world switched to a different blockset
    BlocksetChanged,
    /// A block was placed or broken; carries the block as it looked
    Transient {
        cube: IVec3,
        kind: TransientKind,
        block: BlockId,
        rotation: u8,
    },
}
