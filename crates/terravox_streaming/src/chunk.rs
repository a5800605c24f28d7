//! # Chunk Buffers
//!
//! Renderer-ready voxel buffers.
//!
//! A chunk covers one vertical slab of one patch, padded by one voxel on
//! every side so the mesher can stitch it to its neighbours. For a patch
//! size `ps` the buffer is `(ps + 2)³` voxels.

use serde::{Deserialize, Serialize};
use terravox_shared::{BlockType, ChunkId};

/// Memory layout of a voxel buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoxelOrdering {
    /// `z * sx * sy + x * sy + y` (columns contiguous).
    #[default]
    Zxy,
    /// `x + y * sx + z * sx * sy` (rows contiguous).
    Xyz,
}

impl VoxelOrdering {
    /// Flat index of `(x, y, z)` in a buffer of `size`.
    #[inline]
    #[must_use]
    pub const fn index(self, size: [u32; 3], x: u32, y: u32, z: u32) -> usize {
        let [sx, sy, _] = size;
        match self {
            Self::Zxy => (z * sx * sy + x * sy + y) as usize,
            Self::Xyz => (x + y * sx + z * sx * sy) as usize,
        }
    }
}

/// Voxel payload of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelData {
    /// Block ids; empty when `is_empty`.
    pub data: Vec<u16>,
    /// Padded dimensions `[sx, sy, sz]`.
    pub size: [u32; 3],
    /// No voxel was written; the renderer can skip the upload.
    pub is_empty: bool,
    /// Layout of `data`.
    pub ordering: VoxelOrdering,
}

impl VoxelData {
    /// Number of voxels described by `size`.
    #[inline]
    #[must_use]
    pub const fn volume(&self) -> usize {
        (self.size[0] * self.size[1] * self.size[2]) as usize
    }

    /// Block at padded coordinates, `NONE` when empty or out of range.
    #[must_use]
    pub fn get(&self, x: u32, y: u32, z: u32) -> BlockType {
        if self.is_empty || x >= self.size[0] || y >= self.size[1] || z >= self.size[2] {
            return BlockType::NONE;
        }
        self.data
            .get(self.ordering.index(self.size, x, y, z))
            .map_or(BlockType::NONE, |id| BlockType::new(*id))
    }

    /// Number of non-empty voxels.
    #[must_use]
    pub fn solid_count(&self) -> usize {
        self.data.iter().filter(|id| **id != BlockType::NONE.id()).count()
    }
}

/// A renderer-ready chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk coordinates.
    pub id: ChunkId,
    /// Voxel payload.
    pub voxel_data: VoxelData,
}

impl Chunk {
    /// Creates an empty chunk of padded side `side`.
    #[must_use]
    pub const fn empty(id: ChunkId, side: u32, ordering: VoxelOrdering) -> Self {
        Self {
            id,
            voxel_data: VoxelData {
                data: Vec::new(),
                size: [side; 3],
                is_empty: true,
                ordering,
            },
        }
    }

    /// Shorthand for `voxel_data.is_empty`.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.voxel_data.is_empty
    }
}
