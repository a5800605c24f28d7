//! # Chunk Assembly Integration Tests
//!
//! Seams between neighbouring chunks, empty detection and decoration
//! precedence, on scripted and on procedural terrain.

mod common;

use std::sync::Arc;

use common::{config, session, ScriptedTerrain};
use terravox_procedural::{ProceduralTerrain, WorldSeed};
use terravox_shared::{BlockType, ChunkId, ColumnKey, TerrainGenerator, WorldPos};
use terravox_streaming::{Chunk, TerrainConfig, TerrainSession, VoxelOrdering};

/// Asserts that the shared border of two chunks agrees.
///
/// `b` must be the +x (or +z when `along_z`) neighbour of `a`. Every voxel
/// written into `a`'s far padding must equal `b`'s first interior layer,
/// and the other way round.
fn assert_seam(a: &Chunk, b: &Chunk, along_z: bool) -> usize {
    let side = a.voxel_data.size[0];
    let at = |chunk: &Chunk, layer: u32, u: u32, y: u32| {
        if along_z {
            chunk.voxel_data.get(u, y, layer)
        } else {
            chunk.voxel_data.get(layer, y, u)
        }
    };

    let mut checked = 0;
    for u in 0..side {
        for y in 0..side {
            let a_pad = at(a, side - 1, u, y);
            if !a_pad.is_none() {
                assert_eq!(a_pad, at(b, 1, u, y), "seam mismatch in {} at u={u} y={y}", a.id);
                checked += 1;
            }
            let b_pad = at(b, 0, u, y);
            if !b_pad.is_none() {
                assert_eq!(
                    b_pad,
                    at(a, side - 2, u, y),
                    "seam mismatch in {} at u={u} y={y}",
                    b.id
                );
                checked += 1;
            }
        }
    }
    checked
}

fn covered_session(generator: Arc<dyn TerrainGenerator>, config: TerrainConfig) -> TerrainSession {
    TerrainSession::new(config, generator).unwrap()
}

#[tokio::test]
async fn test_adjacent_chunks_share_their_seams() {
    let terrain = Arc::new(
        ScriptedTerrain::new(36)
            .with_tree(ColumnKey::new(15, 4))
            .with_tree(ColumnKey::new(16, 9)),
    );
    let session = session(&terrain, config(16));
    session.ensure_coverage_with(WorldPos::default(), 2).await;

    let a = session.build_chunk(ChunkId::new(0, 2, 0));
    let east = session.build_chunk(ChunkId::new(1, 2, 0));
    let north = session.build_chunk(ChunkId::new(0, 2, 1));

    let checked = assert_seam(&a, &east, false) + assert_seam(&a, &north, true);
    assert!(checked >= 4 * 16, "seam should be populated, checked {checked}");

    // the trunk rooted on the border shows up in the neighbour's padding
    let ly = (36 + 16 % 7 + 1 - 31) as u32;
    assert_eq!(a.voxel_data.get(17, ly, 10), BlockType::TRUNK);
}

#[tokio::test]
async fn test_procedural_chunks_share_their_seams() {
    let cfg = TerrainConfig {
        patch_size: 16,
        ..TerrainConfig::default()
    };
    let generator = Arc::new(ProceduralTerrain::new(WorldSeed::new(2024)));
    let session = covered_session(generator, cfg);
    session.ensure_coverage_with(WorldPos::new(8.0, 0.0, 8.0), 2).await;

    let mut checked = 0;
    for y in 1..8 {
        let a = session.build_chunk(ChunkId::new(0, y, 0));
        let east = session.build_chunk(ChunkId::new(1, y, 0));
        let north = session.build_chunk(ChunkId::new(0, y, 1));
        checked += assert_seam(&a, &east, false) + assert_seam(&a, &north, true);
    }
    println!("checked {checked} seam voxels");
    assert!(checked > 0);
}

#[tokio::test]
async fn test_chunk_without_coverage_is_empty() {
    let terrain = Arc::new(ScriptedTerrain::new(36));
    let session = session(&terrain, config(16));

    for y in 0..4 {
        let chunk = session.build_chunk(ChunkId::new(7, y, -3));
        assert!(chunk.voxel_data.is_empty);
        assert!(chunk.voxel_data.data.iter().all(|v| *v == 0));
        assert_eq!(chunk.voxel_data.size, [18, 18, 18]);
    }
    assert_eq!(terrain.patch_calls(), 0);
}

#[tokio::test]
async fn test_chunk_far_above_ground_is_empty() {
    let terrain = Arc::new(ScriptedTerrain::new(36));
    let session = session(&terrain, config(16));
    session.ensure_coverage(WorldPos::default()).await;

    assert!(session.build_chunk(ChunkId::new(0, 9, 0)).is_empty());
    assert!(!session.build_chunk(ChunkId::new(0, 2, 0)).is_empty());
}

/// Scenario: a tree overlapping its ground column shows above the ground.
#[tokio::test]
async fn test_tree_overrides_ground_column() {
    let terrain = Arc::new(ScriptedTerrain::new(70).with_tree(ColumnKey::new(10, 10)));
    let session = session(&terrain, config(64));
    session.ensure_coverage(WorldPos::default()).await;

    let chunk = session.build_chunk(ChunkId::new(0, 1, 0));
    let ground = terrain.height(ColumnKey::new(10, 10));
    // padded y of world height h in slab 1 is h - 64 + 1
    let voxel = |h: i32| chunk.voxel_data.get(11, (h - 63) as u32, 11);

    assert_eq!(voxel(ground - 1), BlockType::DIRT);
    for h in ground..ground + 5 {
        assert_eq!(voxel(h), BlockType::TRUNK, "height {h}");
    }
    assert_eq!(voxel(ground + 5), BlockType::FOLIAGE);

    // a neighbouring column keeps its grass
    let neighbour = (terrain.height(ColumnKey::new(11, 10)) - 63) as u32;
    assert_eq!(chunk.voxel_data.get(12, neighbour, 11), BlockType::GRASS);
}

#[tokio::test]
async fn test_orderings_hold_the_same_voxels() {
    let terrain = Arc::new(ScriptedTerrain::new(36));
    let zxy = session(&terrain, config(16));
    let xyz = session(
        &terrain,
        TerrainConfig {
            ordering: VoxelOrdering::Xyz,
            ..config(16)
        },
    );
    zxy.ensure_coverage(WorldPos::default()).await;
    xyz.ensure_coverage(WorldPos::default()).await;

    let id = ChunkId::new(0, 2, 0);
    let a = zxy.build_chunk(id);
    let b = xyz.build_chunk(id);
    assert_ne!(a.voxel_data.data, b.voxel_data.data);
    for (x, y, z) in [(1, 1, 1), (5, 10, 3), (16, 9, 16), (0, 8, 4)] {
        assert_eq!(a.voxel_data.get(x, y, z), b.voxel_data.get(x, y, z));
    }
}
