//! # Chunk Assembler
//!
//! Builds the padded voxel buffer of one chunk from the patch cache.
//!
//! ## Passes
//!
//! 1. Ground: every column of the chunk's patch, from its surface down
//!    through the whole padded slab, layered by the sample's buffer
//! 2. Decoration: trees, rocks and structures of the patch and its eight
//!    neighbours that intersect the padded box
//! 3. Edge: the single surface voxel of each padded border column, read
//!    from the neighbouring patch through the ground resolver
//!
//! ## Precedence
//!
//! Each voxel remembers which pass wrote it:
//!
//! | existing \ incoming | Ground | Decoration | Edge |
//! |---------------------|--------|------------|------|
//! | untouched           | write  | write      | write|
//! | Ground              | write  | write      | skip |
//! | Decoration          | skip   | write      | skip |
//! | Edge                | skip   | skip       | skip |
//!
//! `NONE` never writes. Building is a pure function of the chunk id and
//! the cache contents.

use std::sync::Arc;

use terravox_shared::{BlockType, ChunkId, ColumnKey, Patch};

use crate::chunk::{Chunk, VoxelData, VoxelOrdering};
use crate::codec::ChunkStub;
use crate::error::{TerrainError, TerrainResult};
use crate::ground::GroundBlockResolver;
use crate::patch_cache::PatchCache;

/// Pass that wrote a voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WritePass {
    /// Ground columns.
    Ground,
    /// Decorations.
    Decoration,
    /// Neighbour surface stitching.
    Edge,
}

impl WritePass {
    /// Returns true if a write from `self` may replace a voxel written by
    /// `existing`.
    #[inline]
    #[must_use]
    pub const fn overrides(self, existing: Option<Self>) -> bool {
        match (existing, self) {
            (None, _) | (Some(Self::Ground), Self::Ground | Self::Decoration) => true,
            (Some(Self::Decoration), Self::Decoration) => true,
            _ => false,
        }
    }
}

/// Padded voxel grid with per-voxel write tags.
///
/// Indexed internally as `x + side * (z + side * y)`.
struct VoxelGrid {
    side: u32,
    blocks: Vec<BlockType>,
    passes: Vec<Option<WritePass>>,
    written: usize,
}

impl VoxelGrid {
    fn new(side: u32) -> Self {
        let volume = (side * side * side) as usize;
        Self {
            side,
            blocks: vec![BlockType::NONE; volume],
            passes: vec![None; volume],
            written: 0,
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (x + self.side * (z + self.side * y)) as usize
    }

    /// Tagged write. Returns true if the voxel changed hands.
    fn write(&mut self, x: u32, y: u32, z: u32, block: BlockType, pass: WritePass) -> bool {
        if block.is_none() {
            return false;
        }
        let i = self.index(x, y, z);
        if !pass.overrides(self.passes[i]) {
            return false;
        }
        if self.passes[i].is_none() {
            self.written += 1;
        }
        self.blocks[i] = block;
        self.passes[i] = Some(pass);
        true
    }

    fn into_voxel_data(self, ordering: VoxelOrdering) -> VoxelData {
        let size = [self.side; 3];
        if self.written == 0 {
            return VoxelData {
                data: Vec::new(),
                size,
                is_empty: true,
                ordering,
            };
        }

        let ids: &[u16] = bytemuck::cast_slice(self.blocks.as_slice());
        let mut data = vec![0u16; ids.len()];
        for y in 0..self.side {
            for z in 0..self.side {
                for x in 0..self.side {
                    data[ordering.index(size, x, y, z)] = ids[self.index(x, y, z)];
                }
            }
        }

        VoxelData {
            data,
            size,
            is_empty: false,
            ordering,
        }
    }
}

/// Builds chunks from the patch cache.
pub struct ChunkAssembler {
    patches: Arc<PatchCache>,
    resolver: Arc<GroundBlockResolver>,
    ordering: VoxelOrdering,
}

impl ChunkAssembler {
    /// Creates an assembler producing buffers in `ordering`.
    #[must_use]
    pub fn new(
        patches: Arc<PatchCache>,
        resolver: Arc<GroundBlockResolver>,
        ordering: VoxelOrdering,
    ) -> Self {
        Self {
            patches,
            resolver,
            ordering,
        }
    }

    /// Padded side length of every chunk.
    #[inline]
    #[must_use]
    pub fn side(&self) -> u32 {
        self.patches.patch_size() + 2
    }

    /// Output voxel layout.
    #[inline]
    #[must_use]
    pub const fn ordering(&self) -> VoxelOrdering {
        self.ordering
    }

    /// Builds the chunk `id`.
    ///
    /// A chunk whose own patch is not cached is empty.
    #[must_use]
    pub fn build_chunk(&self, id: ChunkId) -> Chunk {
        let side = self.side();
        let Some(patch) = self.patches.get_patch(id.patch()) else {
            return Chunk::empty(id, side, self.ordering);
        };

        let origin = Origin::of(id, &patch);
        let mut grid = VoxelGrid::new(side);

        // decorations may spill over from any of the eight neighbours
        let sources: Vec<Arc<Patch>> = patch
            .key
            .square(1)
            .into_iter()
            .filter_map(|key| {
                if key == patch.key {
                    Some(Arc::clone(&patch))
                } else {
                    self.patches.get_patch(key)
                }
            })
            .collect();

        Self::ground_pass(&mut grid, &patch, origin);
        Self::decoration_pass(&mut grid, &sources, origin);
        self.edge_pass(&mut grid, origin);

        let chunk = Chunk {
            id,
            voxel_data: grid.into_voxel_data(self.ordering),
        };
        tracing::trace!("built chunk {} (empty: {})", id, chunk.is_empty());
        chunk
    }

    /// Converts a server-delivered stub of column `id.patch()` into a chunk.
    ///
    /// Stubs without voxels are assembled locally.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the voxel count does not match the padded size.
    pub fn chunk_from_stub(&self, id: ChunkId, stub: ChunkStub) -> TerrainResult<Chunk> {
        let side = self.side();
        let Some(voxels) = stub.voxels else {
            return Ok(self.build_chunk(id));
        };

        let expected = (side * side * side) as usize;
        if voxels.len() != expected {
            return Err(TerrainError::Protocol(format!(
                "chunk {} carries {} voxels, expected {}",
                id,
                voxels.len(),
                expected
            )));
        }

        let is_empty = voxels.iter().all(|voxel| *voxel == BlockType::NONE.id());
        Ok(Chunk {
            id,
            voxel_data: VoxelData {
                data: if is_empty { Vec::new() } else { voxels },
                size: [side; 3],
                is_empty,
                ordering: self.ordering,
            },
        })
    }

    fn ground_pass(grid: &mut VoxelGrid, patch: &Patch, origin: Origin) {
        let side = grid.side;
        for lz in 1..side - 1 {
            for lx in 1..side - 1 {
                let Some(sample) = patch.sample(lx - 1, lz - 1) else {
                    continue;
                };
                for ly in 0..side {
                    let wy = origin.y + ly as i32;
                    if wy > sample.height {
                        break;
                    }
                    let depth = sample.height.abs_diff(wy);
                    grid.write(lx, ly, lz, sample.block_at_depth(depth), WritePass::Ground);
                }
            }
        }
    }

    fn decoration_pass(grid: &mut VoxelGrid, sources: &[Arc<Patch>], origin: Origin) {
        let side = grid.side as i32;
        let min = [origin.x, origin.y, origin.z];
        let max = [origin.x + side, origin.y + side, origin.z + side];

        for source in sources {
            for decoration in source.decorations() {
                if !decoration.intersects(min, max) {
                    continue;
                }
                let lo: [i32; 3] = std::array::from_fn(|a| decoration.origin[a].max(min[a]));
                let hi = decoration.max();
                let hi: [i32; 3] = std::array::from_fn(|a| hi[a].min(max[a]));

                for wy in lo[1]..hi[1] {
                    for wz in lo[2]..hi[2] {
                        for wx in lo[0]..hi[0] {
                            let block = decoration.block_at(
                                wx.abs_diff(decoration.origin[0]),
                                wy.abs_diff(decoration.origin[1]),
                                wz.abs_diff(decoration.origin[2]),
                            );
                            grid.write(
                                wx.abs_diff(origin.x),
                                wy.abs_diff(origin.y),
                                wz.abs_diff(origin.z),
                                block,
                                WritePass::Decoration,
                            );
                        }
                    }
                }
            }
        }
    }

    fn edge_pass(&self, grid: &mut VoxelGrid, origin: Origin) {
        let last = grid.side - 1;
        let border = (0..=last)
            .flat_map(|i| [(i, 0), (i, last), (0, i), (last, i)])
            .collect::<Vec<_>>();

        for (lx, lz) in border {
            let column = ColumnKey::new(origin.x + lx as i32, origin.z + lz as i32);
            let Some(surface) = self.resolver.peek(column) else {
                continue;
            };
            let ly = surface.height - origin.y;
            if (0..=last as i32).contains(&ly) {
                grid.write(lx, ly as u32, lz, surface.block, WritePass::Edge);
            }
        }
    }
}

/// World coordinates of padded voxel `(0, 0, 0)`.
#[derive(Clone, Copy, Debug)]
struct Origin {
    x: i32,
    y: i32,
    z: i32,
}

impl Origin {
    fn of(id: ChunkId, patch: &Patch) -> Self {
        Self {
            x: patch.bounds.min.x - 1,
            y: id.min_y(patch.patch_size) - 1,
            z: patch.bounds.min.z - 1,
        }
    }
}
