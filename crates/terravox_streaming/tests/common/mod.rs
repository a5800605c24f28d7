//! Shared fixtures for the streaming integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use terravox_shared::{
    BlockType, ChunkId, ColumnKey, ColumnResult, Decoration, DecorationKind, GenerationError,
    GroundSample, Patch, PatchKey, TerrainGenerator, WorldPos,
};
use terravox_streaming::{
    Chunk, ColumnRequester, PlayerTracker, TerrainConfig, TerrainSession, VoxelmapViewer,
};

/// Scripted terrain: height `base + x mod 7`, grass over dirt over stone.
pub struct ScriptedTerrain {
    base: i32,
    trees: Vec<ColumnKey>,
    failing: Mutex<HashSet<PatchKey>>,
    gate: Option<Receiver<()>>,
    pub patch_calls: AtomicUsize,
    pub peak_calls: AtomicUsize,
    pub generated: Mutex<Vec<PatchKey>>,
}

impl ScriptedTerrain {
    pub fn new(base: i32) -> Self {
        Self {
            base,
            trees: Vec::new(),
            failing: Mutex::new(HashSet::new()),
            gate: None,
            patch_calls: AtomicUsize::new(0),
            peak_calls: AtomicUsize::new(0),
            generated: Mutex::new(Vec::new()),
        }
    }

    /// Plants a tree rooted on the ground voxel of `column`.
    pub fn with_tree(mut self, column: ColumnKey) -> Self {
        self.trees.push(column);
        self
    }

    /// Every call waits for one message on the returned sender.
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn fail_patch(&self, key: PatchKey) {
        self.failing.lock().insert(key);
    }

    pub fn height(&self, column: ColumnKey) -> i32 {
        self.base + column.x.rem_euclid(7)
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    pub fn peak_calls(&self) -> usize {
        self.peak_calls.load(Ordering::SeqCst)
    }

    fn sample(&self, column: ColumnKey) -> GroundSample {
        GroundSample::new(self.height(column), BlockType::STONE)
            .with_buffer(vec![BlockType::GRASS, BlockType::DIRT])
    }

    fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
    }

    fn tree(&self, column: ColumnKey) -> Decoration {
        // 1x6x1 trunk rooted in the ground voxel, foliage cap on top
        let ground = self.height(column);
        let mut blocks = vec![BlockType::TRUNK; 5];
        blocks.push(BlockType::FOLIAGE);
        Decoration::new(
            DecorationKind::Tree,
            [column.x, ground, column.z],
            [1, 6, 1],
            blocks,
        )
        .unwrap()
    }
}

impl TerrainGenerator for ScriptedTerrain {
    fn generate_patch(&self, key: PatchKey, patch_size: u32) -> Result<Patch, GenerationError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate();
        if self.failing.lock().contains(&key) {
            return Err(GenerationError::Failed(format!("{key} refused")));
        }
        self.generated.lock().push(key);

        let bounds = key.bounds(patch_size);
        let mut samples = Vec::with_capacity((patch_size * patch_size) as usize);
        for z in bounds.min.z..bounds.max.z {
            for x in bounds.min.x..bounds.max.x {
                samples.push(self.sample(ColumnKey::new(x, z)));
            }
        }
        let decorations = self
            .trees
            .iter()
            .filter(|column| bounds.contains(**column))
            .map(|column| self.tree(*column))
            .collect();
        Patch::new(key, patch_size, samples, decorations)
    }

    fn peak_position(&self, column: ColumnKey) -> Result<ColumnResult, GenerationError> {
        self.peak_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate();
        Ok(self.sample(column).column_result())
    }
}

pub fn config(patch_size: u32) -> TerrainConfig {
    TerrainConfig {
        patch_size,
        view_distance: 1,
        min_chunk_y: 0,
        max_chunk_y: 1,
        ..TerrainConfig::default()
    }
}

pub fn session(terrain: &Arc<ScriptedTerrain>, config: TerrainConfig) -> TerrainSession {
    TerrainSession::new(config, Arc::clone(terrain) as Arc<dyn TerrainGenerator>).unwrap()
}

/// Player standing wherever the test puts it.
#[derive(Default)]
pub struct MovablePlayer {
    position: Mutex<Option<WorldPos>>,
}

impl MovablePlayer {
    pub fn at(x: f64, z: f64) -> Self {
        let player = Self::default();
        player.move_to(x, z);
        player
    }

    pub fn move_to(&self, x: f64, z: f64) {
        *self.position.lock() = Some(WorldPos::new(x, 80.0, z));
    }
}

impl PlayerTracker for MovablePlayer {
    fn position(&self) -> Option<WorldPos> {
        *self.position.lock()
    }
}

/// Records everything handed to the renderer.
#[derive(Default)]
pub struct RecordingViewer {
    pub submitted: Mutex<Vec<Chunk>>,
    pub visibility_calls: Mutex<Vec<Vec<ChunkId>>>,
    pub lod_updates: AtomicUsize,
}

impl VoxelmapViewer for RecordingViewer {
    fn submit_chunk(&self, chunk: Chunk) {
        self.submitted.lock().push(chunk);
    }

    fn set_visible_chunks(&self, ids: &[ChunkId]) {
        self.visibility_calls.lock().push(ids.to_vec());
    }

    fn update_lod(&self, _camera: WorldPos) {
        self.lod_updates.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records column requests.
#[derive(Default)]
pub struct RecordingRequester {
    pub requests: Mutex<Vec<Vec<PatchKey>>>,
}

impl RecordingRequester {
    pub fn all(&self) -> Vec<PatchKey> {
        self.requests.lock().iter().flatten().copied().collect()
    }
}

impl ColumnRequester for RecordingRequester {
    fn request_columns(&self, keys: &[PatchKey]) {
        self.requests.lock().push(keys.to_vec());
    }
}
