//! # Cache Integration Tests
//!
//! Deduplication, idempotence and abort behaviour of the patch cache and
//! the ground block resolver, driven through a full session.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{config, session, ScriptedTerrain};
use terravox_shared::{BlockType, ColumnKey, ColumnResult, PatchKey, WorldPos};
use terravox_streaming::{Resolution, TerrainConfig, TerrainError};

/// N concurrent resolves of one column reach the generator once.
#[tokio::test]
async fn test_concurrent_resolves_are_deduplicated() {
    let (terrain, gate) = ScriptedTerrain::new(40).gated();
    let terrain = Arc::new(terrain);
    let session = session(&terrain, config(16));
    let key = ColumnKey::new(-300, 512);

    let resolutions: Vec<Resolution> = (0..32).map(|_| session.resolver().resolve(key)).collect();
    assert!(resolutions.iter().all(|r| r.ready().is_none()));

    gate.send(()).unwrap();
    let mut heights = HashSet::new();
    for resolution in resolutions {
        heights.insert(resolution.wait().await.unwrap().height);
    }

    assert_eq!(heights.len(), 1);
    assert_eq!(terrain.peak_calls(), 1);
    println!("32 resolves, {} generator call", terrain.peak_calls());
}

/// Coverage twice in a row only generates on the first call.
#[tokio::test]
async fn test_ensure_coverage_is_idempotent() {
    let terrain = Arc::new(ScriptedTerrain::new(40));
    let session = session(&terrain, config(16));
    let pos = WorldPos::new(100.0, 60.0, -20.0);

    assert!(session.ensure_coverage(pos).await);
    let calls = terrain.patch_calls();
    assert!(!session.ensure_coverage(pos).await);
    assert_eq!(terrain.patch_calls(), calls);
}

/// Scenario: patch size 64, radius 1 at the origin generates the 3x3
/// square, each patch exactly once.
#[tokio::test]
async fn test_origin_coverage_generates_square_once() {
    let terrain = Arc::new(ScriptedTerrain::new(40));
    let session = session(&terrain, config(64));

    let update = session
        .ensure_coverage_with(WorldPos::new(0.0, 0.0, 0.0), 1)
        .await;
    assert!(update.refreshed);

    let mut generated = terrain.generated.lock().clone();
    generated.sort_unstable();
    let mut expected = PatchKey::new(0, 0).square(1);
    expected.sort_unstable();
    assert_eq!(generated, expected);
    assert_eq!(session.patches().keys(), expected);

    session.ensure_coverage(WorldPos::new(10.0, 0.0, 63.0)).await;
    assert_eq!(terrain.patch_calls(), 9);
}

/// Scenario: a memoised column answers again with no generator call.
#[tokio::test]
async fn test_memoised_column_needs_no_generation() {
    let terrain = Arc::new(ScriptedTerrain::new(77));
    let session = session(&terrain, config(64));
    let key = ColumnKey::new(10, 20);

    let first = session.resolver().resolve(key).wait().await.unwrap();
    assert_eq!(first, ColumnResult::new(80, BlockType::GRASS));
    let calls = terrain.peak_calls();

    match session.resolver().resolve(key) {
        Resolution::Ready(result) => assert_eq!(result, first),
        Resolution::Pending(_) => panic!("memoised column went back to the workers"),
    }
    assert_eq!(session.get_ground_height_sync(10.4, 20.9), 80.0);
    assert_eq!(terrain.peak_calls(), calls);
}

/// Failed patches stay missing and are retried.
#[tokio::test]
async fn test_generation_failure_is_retried() {
    let terrain = Arc::new(ScriptedTerrain::new(40));
    terrain.fail_patch(PatchKey::new(1, 0));
    let session = session(&terrain, config(16));

    let update = session.ensure_coverage_with(WorldPos::default(), 1).await;
    assert_eq!(update.failed, vec![PatchKey::new(1, 0)]);
    assert!(!session.patches().contains(PatchKey::new(1, 0)));

    let update = session.ensure_coverage_with(WorldPos::default(), 1).await;
    assert_eq!(update.failed, vec![PatchKey::new(1, 0)]);
    assert_eq!(terrain.patch_calls(), 10);
}

/// Scenario: aborting after dispatch discards the results.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_mid_flight_discards_results() {
    let (terrain, gate) = ScriptedTerrain::new(40).gated();
    let terrain = Arc::new(terrain);
    let single_patch = TerrainConfig {
        cache_radius: 0,
        ..config(16)
    };
    let session = Arc::new(session(&terrain, single_patch));

    let coverage = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.ensure_coverage_with(WorldPos::default(), 0).await })
    };
    let column = session.resolver().resolve(ColumnKey::new(500, 500));

    // wait until both requests have reached the generator
    while terrain.patch_calls() + terrain.peak_calls() < 2 {
        tokio::task::yield_now().await;
    }

    session.abort();
    gate.send(()).unwrap();
    gate.send(()).unwrap();

    let update = coverage.await.unwrap();
    assert!(update.generated.is_empty());
    assert_eq!(column.wait().await, Err(TerrainError::Aborted));

    assert_eq!(session.patches().patch_count(), 0);
    assert_eq!(session.resolver().memo_len(), 0);
    assert!(session.get_ground_height(500.0, 500.0).await.is_err());
}
