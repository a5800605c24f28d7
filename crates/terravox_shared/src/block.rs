//! Block type identifiers.
//!
//! A block type is a `u16` so a chunk buffer can be handed to the renderer
//! as a flat `Uint16`-style array without conversion.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A single voxel block type.
///
/// `BlockType::NONE` is the empty voxel; every other value is solid or
/// otherwise visible.
#[repr(transparent)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable, Serialize,
    Deserialize,
)]
pub struct BlockType(pub u16);

impl BlockType {
    /// Empty voxel.
    pub const NONE: Self = Self(0);
    /// Grass top soil.
    pub const GRASS: Self = Self(1);
    /// Dirt.
    pub const DIRT: Self = Self(2);
    /// Stone.
    pub const STONE: Self = Self(3);
    /// Sand (beaches, deserts).
    pub const SAND: Self = Self(4);
    /// Bare rock (cliffs, mountains).
    pub const ROCK: Self = Self(5);
    /// Water surface.
    pub const WATER: Self = Self(6);
    /// Snow cover.
    pub const SNOW: Self = Self(7);
    /// Mud (swamps).
    pub const MUD: Self = Self(8);
    /// Tree trunk.
    pub const TRUNK: Self = Self(9);
    /// Tree foliage.
    pub const FOLIAGE: Self = Self(10);
    /// Loose boulder.
    pub const BOULDER: Self = Self(11);

    /// Creates a block type from its raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u16 {
        self.0
    }

    /// Returns true for the empty voxel.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<BlockType> for u16 {
    fn from(block: BlockType) -> Self {
        block.0
    }
}
