//! # Terrain Coordinates
//!
//! Three integer grids are used by the terrain pipeline:
//!
//! - `ColumnKey`: one world column (floored x, z)
//! - `PatchKey`: one square patch of `patch_size` columns per side, also the
//!   key of a chunk column
//! - `ChunkId`: one vertical slab of a patch
//!
//! Keys render as `"x:z"` (and `"x:y:z"` for chunks), the textual form used
//! by the network collaborator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a textual key cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid terrain key `{0}`, expected `x:z`")]
pub struct ParseKeyError(pub String);

/// Parses `"x:z"` into its two components.
fn parse_pair(s: &str) -> Result<(i32, i32), ParseKeyError> {
    let (x, z) = s.split_once(':').ok_or_else(|| ParseKeyError(s.to_string()))?;
    let x = x.trim().parse().map_err(|_| ParseKeyError(s.to_string()))?;
    let z = z.trim().parse().map_err(|_| ParseKeyError(s.to_string()))?;
    Ok((x, z))
}

/// A world-space position (player, camera).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate (height).
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl WorldPos {
    /// Creates a new world position.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the column this position stands in.
    #[inline]
    #[must_use]
    pub fn column(self) -> ColumnKey {
        ColumnKey::from_world(self.x, self.z)
    }
}

/// A single world column, identified by floored horizontal coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    /// World X.
    pub x: i32,
    /// World Z.
    pub z: i32,
}

impl ColumnKey {
    /// Creates a new column key.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Floors world coordinates into a column key.
    #[inline]
    #[must_use]
    pub fn from_world(x: f64, z: f64) -> Self {
        Self {
            x: x.floor() as i32,
            z: z.floor() as i32,
        }
    }

    /// Returns the patch owning this column.
    #[inline]
    #[must_use]
    pub const fn patch(self, patch_size: u32) -> PatchKey {
        PatchKey::from_column(self, patch_size)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.z)
    }
}

impl FromStr for ColumnKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pair(s).map(|(x, z)| Self::new(x, z))
    }
}

/// A square patch of terrain, also the key of a chunk column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchKey {
    /// X coordinate (in patches, not columns).
    pub x: i32,
    /// Z coordinate (in patches, not columns).
    pub z: i32,
}

impl PatchKey {
    /// Creates a new patch key.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns the patch owning a column.
    #[inline]
    #[must_use]
    pub const fn from_column(column: ColumnKey, patch_size: u32) -> Self {
        Self {
            x: column.x.div_euclid(patch_size as i32),
            z: column.z.div_euclid(patch_size as i32),
        }
    }

    /// Returns the patch under a world position.
    #[inline]
    #[must_use]
    pub fn from_world(pos: WorldPos, patch_size: u32) -> Self {
        Self::from_column(pos.column(), patch_size)
    }

    /// Returns the world-space bounds of this patch.
    #[inline]
    #[must_use]
    pub const fn bounds(self, patch_size: u32) -> PatchBounds {
        let size = patch_size as i32;
        PatchBounds {
            min: ColumnKey::new(self.x * size, self.z * size),
            max: ColumnKey::new((self.x + 1) * size, (self.z + 1) * size),
        }
    }

    /// Chebyshev (square-ring) distance between two patches.
    #[inline]
    #[must_use]
    pub const fn ring_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dz = self.z.abs_diff(other.z);
        if dx > dz {
            dx
        } else {
            dz
        }
    }

    /// Offsets this key by whole patches.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// Returns every key of the `(2r+1)²` square centred on this patch.
    #[must_use]
    pub fn square(self, radius: u32) -> Vec<Self> {
        let r = radius as i32;
        let mut keys = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dz in -r..=r {
            for dx in -r..=r {
                keys.push(self.offset(dx, dz));
            }
        }
        keys
    }
}

impl fmt::Display for PatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.z)
    }
}

impl FromStr for PatchKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_pair(s).map(|(x, z)| Self::new(x, z))
    }
}

/// Horizontal bounds of a patch: `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchBounds {
    /// Minimum corner (inclusive).
    pub min: ColumnKey,
    /// Maximum corner (exclusive).
    pub max: ColumnKey,
}

impl PatchBounds {
    /// Returns true if the column lies inside these bounds.
    #[inline]
    #[must_use]
    pub const fn contains(&self, column: ColumnKey) -> bool {
        column.x >= self.min.x
            && column.x < self.max.x
            && column.z >= self.min.z
            && column.z < self.max.z
    }

    /// Width along X in columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.max.x.abs_diff(self.min.x)
    }

    /// Depth along Z in columns.
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.max.z.abs_diff(self.min.z)
    }
}

/// Identifies one vertical slab of one patch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    /// Patch X.
    pub x: i32,
    /// Vertical slab index.
    pub y: i32,
    /// Patch Z.
    pub z: i32,
}

impl ChunkId {
    /// Creates a new chunk id.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the patch (chunk column) this chunk belongs to.
    #[inline]
    #[must_use]
    pub const fn patch(self) -> PatchKey {
        PatchKey::new(self.x, self.z)
    }

    /// Lowest world height covered by this slab.
    #[inline]
    #[must_use]
    pub const fn min_y(self, patch_size: u32) -> i32 {
        self.y * patch_size as i32
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_from_column() {
        assert_eq!(ColumnKey::new(0, 0).patch(64), PatchKey::new(0, 0));
        assert_eq!(ColumnKey::new(63, 63).patch(64), PatchKey::new(0, 0));
        assert_eq!(ColumnKey::new(64, 64).patch(64), PatchKey::new(1, 1));
        assert_eq!(ColumnKey::new(-1, -1).patch(64), PatchKey::new(-1, -1));
        assert_eq!(ColumnKey::new(-64, -65).patch(64), PatchKey::new(-1, -2));
    }

    #[test]
    fn test_column_from_world_floors() {
        assert_eq!(ColumnKey::from_world(10.9, 20.1), ColumnKey::new(10, 20));
        assert_eq!(ColumnKey::from_world(-0.5, -1.5), ColumnKey::new(-1, -2));
    }

    #[test]
    fn test_key_text_form() {
        let key = PatchKey::new(-3, 7);
        assert_eq!(key.to_string(), "-3:7");
        assert_eq!("-3:7".parse::<PatchKey>(), Ok(key));
        assert!("3;7".parse::<PatchKey>().is_err());
        assert!("a:7".parse::<ColumnKey>().is_err());
    }

    #[test]
    fn test_bounds_are_patch_sized() {
        let bounds = PatchKey::new(-1, 2).bounds(64);
        assert_eq!(bounds.width(), 64);
        assert_eq!(bounds.depth(), 64);
        assert_eq!(bounds.min, ColumnKey::new(-64, 128));
        assert!(bounds.contains(ColumnKey::new(-1, 191)));
        assert!(!bounds.contains(ColumnKey::new(0, 128)));
    }

    #[test]
    fn test_square_and_ring_distance() {
        let centre = PatchKey::new(0, 0);
        let square = centre.square(1);
        assert_eq!(square.len(), 9);
        assert!(square.iter().all(|k| k.ring_distance(centre) <= 1));
        assert_eq!(PatchKey::new(3, -5).ring_distance(centre), 5);
    }
}
