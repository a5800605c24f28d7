//! # Patch Data
//!
//! A patch is a square horizontal region of terrain holding one ground
//! sample per column plus the decorations anchored inside it.
//!
//! ## Ground layering
//!
//! A sample carries a primary block type and an optional layered buffer
//! listed from the surface downward. `buffer[d]` replaces the primary type
//! at depth `d` below the surface when it is not `NONE`, so a sand-over-rock
//! beach is `block = ROCK, buffer = [SAND, SAND, SAND]`.

use crate::block::BlockType;
use crate::coords::{ColumnKey, PatchBounds, PatchKey};
use crate::generator::GenerationError;

/// The top ground voxel of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnResult {
    /// World height of the top ground voxel.
    pub height: i32,
    /// Visible block type at that height.
    pub block: BlockType,
}

impl ColumnResult {
    /// Creates a new column result.
    #[inline]
    #[must_use]
    pub const fn new(height: i32, block: BlockType) -> Self {
        Self { height, block }
    }
}

/// Ground data of a single column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroundSample {
    /// World height of the top ground voxel.
    pub height: i32,
    /// Primary ground block type.
    pub block: BlockType,
    /// Optional sub-type (biome variant, tint index).
    pub sub_type: Option<u8>,
    /// Layer overrides from the surface downward.
    pub buffer: Vec<BlockType>,
}

impl GroundSample {
    /// Creates a sample with no layering.
    #[must_use]
    pub fn new(height: i32, block: BlockType) -> Self {
        Self {
            height,
            block,
            sub_type: None,
            buffer: Vec::new(),
        }
    }

    /// Sets the layer overrides.
    #[must_use]
    pub fn with_buffer(mut self, buffer: Vec<BlockType>) -> Self {
        self.buffer = buffer;
        self
    }

    /// Sets the sub-type.
    #[must_use]
    pub fn with_sub_type(mut self, sub_type: u8) -> Self {
        self.sub_type = Some(sub_type);
        self
    }

    /// Block type at `depth` voxels below the surface.
    #[inline]
    #[must_use]
    pub fn block_at_depth(&self, depth: u32) -> BlockType {
        match self.buffer.get(depth as usize) {
            Some(layer) if !layer.is_none() => *layer,
            _ => self.block,
        }
    }

    /// Visible block type at the surface.
    #[inline]
    #[must_use]
    pub fn top_block(&self) -> BlockType {
        self.block_at_depth(0)
    }

    /// Returns the column result for this sample.
    #[inline]
    #[must_use]
    pub fn column_result(&self) -> ColumnResult {
        ColumnResult::new(self.height, self.top_block())
    }
}

/// What a decoration represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    /// Tree (trunk + foliage).
    Tree,
    /// Rock or boulder cluster.
    Rock,
    /// Placed structure.
    Structure,
}

/// A procedurally placed block template (tree, rock, structure).
///
/// Blocks are stored densely, indexed as `x + sx * (z + sz * y)`;
/// `NONE` entries are transparent and never written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoration {
    /// What this decoration is.
    pub kind: DecorationKind,
    /// World-space minimum corner `[x, y, z]`.
    pub origin: [i32; 3],
    /// Extent `[sx, sy, sz]` in voxels.
    pub size: [u32; 3],
    blocks: Vec<BlockType>,
}

impl Decoration {
    /// Creates a decoration, checking the block count against its size.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::DecorationSize` if `blocks` does not hold
    /// exactly `sx * sy * sz` entries.
    pub fn new(
        kind: DecorationKind,
        origin: [i32; 3],
        size: [u32; 3],
        blocks: Vec<BlockType>,
    ) -> Result<Self, GenerationError> {
        let expected = size.iter().map(|s| *s as usize).product::<usize>();
        if blocks.len() != expected {
            return Err(GenerationError::DecorationSize {
                expected,
                actual: blocks.len(),
            });
        }
        Ok(Self {
            kind,
            origin,
            size,
            blocks,
        })
    }

    /// Block at a local offset, `NONE` outside the template.
    #[inline]
    #[must_use]
    pub fn block_at(&self, dx: u32, dy: u32, dz: u32) -> BlockType {
        let [sx, sy, sz] = self.size;
        if dx >= sx || dy >= sy || dz >= sz {
            return BlockType::NONE;
        }
        self.blocks[(dx + sx * (dz + sz * dy)) as usize]
    }

    /// World-space maximum corner (exclusive).
    #[inline]
    #[must_use]
    pub fn max(&self) -> [i32; 3] {
        [
            self.origin[0] + self.size[0] as i32,
            self.origin[1] + self.size[1] as i32,
            self.origin[2] + self.size[2] as i32,
        ]
    }

    /// Returns true if this decoration overlaps the box `[min, max)`.
    #[must_use]
    pub fn intersects(&self, min: [i32; 3], max: [i32; 3]) -> bool {
        let own_max = self.max();
        (0..3).all(|axis| self.origin[axis] < max[axis] && own_max[axis] > min[axis])
    }
}

/// A square terrain patch.
///
/// Immutable once built. Caches hold it behind an `Arc` and replace it
/// on refresh.
#[derive(Clone, Debug)]
pub struct Patch {
    /// Patch coordinates.
    pub key: PatchKey,
    /// Side length in columns.
    pub patch_size: u32,
    /// World-space bounds.
    pub bounds: PatchBounds,
    /// Patch sits on the edge of a biome region.
    pub is_transition_patch: bool,
    /// Patch mixes more than one biome.
    pub is_biome_transition: bool,
    samples: Vec<GroundSample>,
    decorations: Vec<Decoration>,
}

impl Patch {
    /// Builds a patch from row-major samples (`z * patch_size + x`).
    ///
    /// # Errors
    ///
    /// Returns an error if `patch_size` is zero or the sample count is not
    /// `patch_size²`.
    pub fn new(
        key: PatchKey,
        patch_size: u32,
        samples: Vec<GroundSample>,
        decorations: Vec<Decoration>,
    ) -> Result<Self, GenerationError> {
        if patch_size == 0 {
            return Err(GenerationError::InvalidPatchSize(patch_size));
        }
        let expected = (patch_size * patch_size) as usize;
        if samples.len() != expected {
            return Err(GenerationError::SampleCount {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            key,
            patch_size,
            bounds: key.bounds(patch_size),
            is_transition_patch: false,
            is_biome_transition: false,
            samples,
            decorations,
        })
    }

    /// Sets the biome transition flags.
    #[must_use]
    pub fn with_transition_flags(mut self, transition_patch: bool, biome_transition: bool) -> Self {
        self.is_transition_patch = transition_patch;
        self.is_biome_transition = biome_transition;
        self
    }

    /// Sample at local coordinates, `None` outside the patch.
    #[inline]
    #[must_use]
    pub fn sample(&self, local_x: u32, local_z: u32) -> Option<&GroundSample> {
        if local_x >= self.patch_size || local_z >= self.patch_size {
            return None;
        }
        self.samples.get((local_z * self.patch_size + local_x) as usize)
    }

    /// Sample of a world column, `None` if the column is outside the patch.
    #[must_use]
    pub fn sample_at(&self, column: ColumnKey) -> Option<&GroundSample> {
        if !self.bounds.contains(column) {
            return None;
        }
        let local_x = column.x.abs_diff(self.bounds.min.x);
        let local_z = column.z.abs_diff(self.bounds.min.z);
        self.sample(local_x, local_z)
    }

    /// Top ground voxel of a world column.
    #[inline]
    #[must_use]
    pub fn column(&self, column: ColumnKey) -> Option<ColumnResult> {
        self.sample_at(column).map(GroundSample::column_result)
    }

    /// All samples, row-major.
    #[inline]
    #[must_use]
    pub fn samples(&self) -> &[GroundSample] {
        &self.samples
    }

    /// Decorations anchored in this patch.
    #[inline]
    #[must_use]
    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    /// Highest ground sample in the patch.
    #[must_use]
    pub fn max_height(&self) -> i32 {
        self.samples.iter().map(|s| s.height).max().unwrap_or(i32::MIN)
    }
}
