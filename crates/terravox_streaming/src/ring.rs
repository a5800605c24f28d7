//! # View Rings
//!
//! Square rings of chunk columns around the player, walked outward so the
//! columns nearest the player are requested first.

use terravox_shared::{ChunkId, PatchKey};

/// Number of columns on ring `r`.
#[inline]
#[must_use]
pub const fn ring_length(r: u32) -> u32 {
    if r == 0 {
        1
    } else {
        8 * r
    }
}

/// The `i`-th column of ring `r` around `center`, walking the four edges
/// counter-clockwise from the minimum corner.
#[must_use]
pub const fn ring_coord(center: PatchKey, r: u32, i: u32) -> PatchKey {
    if r == 0 {
        return center;
    }
    let r = r as i32;
    let side = 2 * r;
    let i = i as i32 % (4 * side);
    let offset = i % side;
    let (dx, dz) = match i / side {
        0 => (-r + offset, -r),
        1 => (r, -r + offset),
        2 => (r - offset, r),
        _ => (-r, r - offset),
    };
    center.offset(dx, dz)
}

/// Every column within `view_distance` rings of `center`, nearest first.
#[must_use]
pub fn spiral(center: PatchKey, view_distance: u32) -> Vec<PatchKey> {
    let total = (2 * view_distance + 1) * (2 * view_distance + 1);
    let mut keys = Vec::with_capacity(total as usize);
    for r in 0..=view_distance {
        for i in 0..ring_length(r) {
            keys.push(ring_coord(center, r, i));
        }
    }
    keys
}

/// Chunk ids of `columns` stacked over the slabs `min_y..=max_y`.
#[must_use]
pub fn chunk_ids(columns: &[PatchKey], min_y: i32, max_y: i32) -> Vec<ChunkId> {
    columns
        .iter()
        .flat_map(|column| (min_y..=max_y).map(|y| ChunkId::new(column.x, y, column.z)))
        .collect()
}
