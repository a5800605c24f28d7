//! # Streaming Coordinator
//!
//! Decides which chunk columns must be visible and swaps them in a whole
//! ring at a time.
//!
//! ## State machine
//!
//! ```text
//! Idle ──▶ Watching ──▶ Requesting ──▶ Watching ──▶ ... ──▶ Stopped
//!              ▲             │
//!              └─────────────┘ (ring complete)
//! ```
//!
//! Every poll the coordinator reads the player position. When the player
//! enters a new chunk column it computes the ring of columns within the
//! view distance and requests the ones it has never received. Nothing is
//! shown until every column of the ring is present and decodes cleanly;
//! then all chunks are handed to the viewer and the visible set is swapped
//! in one call.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use terravox_shared::{ChunkId, ColumnKey, PatchKey, WorldPos};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::assembler::ChunkAssembler;
use crate::chunk::Chunk;
use crate::codec::{ChunkStub, ColumnDecoder};
use crate::column_cache::CompressedColumnCache;
use crate::config::TerrainConfig;
use crate::error::{TerrainError, TerrainResult};
use crate::ground::GroundBlockResolver;
use crate::patch_cache::PatchCache;
use crate::ring;
use crate::signal::AbortSignal;

/// Ground columns prefetched around the player on every ring change.
const PREFETCH_RADIUS: i32 = 2;

/// Reports where the player is.
pub trait PlayerTracker: Send + Sync {
    /// Current player position, `None` before the player spawns.
    fn position(&self) -> Option<WorldPos>;
}

/// Consumes chunks (the renderer side).
pub trait VoxelmapViewer: Send + Sync {
    /// Uploads one chunk.
    fn submit_chunk(&self, chunk: Chunk);

    /// Atomically replaces the visible set.
    fn set_visible_chunks(&self, ids: &[ChunkId]);

    /// Adjusts level of detail for the camera position.
    fn update_lod(&self, _camera: WorldPos) {}
}

/// Asks the server for compressed chunk columns.
pub trait ColumnRequester: Send + Sync {
    /// Requests columns; answers arrive later as [`ColumnMessage`]s.
    fn request_columns(&self, keys: &[PatchKey]);
}

/// A compressed chunk column delivered by the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMessage {
    /// Column key, `"x:z"`.
    pub key: String,
    /// LZ4 column payload.
    pub compressed_column: Vec<u8>,
}

/// Coordinator lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Not started.
    Idle,
    /// Current ring is visible.
    Watching,
    /// A ring is waiting for columns.
    Requesting,
    /// Aborted.
    Stopped,
}

/// Result of one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session was aborted.
    Stopped,
    /// No player position yet.
    NoPlayer,
    /// The player did not change chunk column.
    Unchanged,
    /// The ring is incomplete.
    Waiting {
        /// Columns still missing or undecodable.
        missing: usize,
    },
    /// A complete ring was made visible.
    Rendered {
        /// Chunks handed to the viewer.
        chunks: usize,
    },
}

/// Collaborators the coordinator talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Player position source.
    pub player: Arc<dyn PlayerTracker>,
    /// Chunk consumer.
    pub viewer: Arc<dyn VoxelmapViewer>,
    /// Column request sink.
    pub requester: Arc<dyn ColumnRequester>,
}

/// Session pieces the coordinator drives.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub patches: Arc<PatchCache>,
    pub resolver: Arc<GroundBlockResolver>,
    pub assembler: Arc<ChunkAssembler>,
    pub columns: Arc<Mutex<CompressedColumnCache>>,
    pub decoder: Arc<dyn ColumnDecoder>,
    pub signal: AbortSignal,
}

/// Drives ring streaming for one session.
pub struct StreamingCoordinator {
    config: TerrainConfig,
    pipeline: Pipeline,
    collaborators: Collaborators,
    state: CoordinatorState,
    last_column: Option<PatchKey>,
    pending_ring: Option<Vec<PatchKey>>,
    requested: HashSet<PatchKey>,
    visible: Vec<ChunkId>,
}

impl StreamingCoordinator {
    pub(crate) fn new(
        config: TerrainConfig,
        pipeline: Pipeline,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            pipeline,
            collaborators,
            state: CoordinatorState::Idle,
            last_column: None,
            pending_ring: None,
            requested: HashSet::new(),
            visible: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Chunks made visible by the last complete ring.
    #[must_use]
    pub fn visible(&self) -> &[ChunkId] {
        &self.visible
    }

    /// Polls the player once and advances the ring if possible.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.pipeline.signal.is_aborted() {
            return self.stop();
        }
        if self.state == CoordinatorState::Idle {
            self.state = CoordinatorState::Watching;
        }

        let Some(position) = self.collaborators.player.position() else {
            return TickOutcome::NoPlayer;
        };
        let center = PatchKey::from_world(position, self.config.patch_size);

        if self.last_column != Some(center) {
            tracing::debug!("player entered chunk column {}", center);
            self.last_column = Some(center);
            self.pending_ring = Some(ring::spiral(center, self.config.view_distance));
            self.requested.retain(|key| key.ring_distance(center) <= self.config.view_distance);

            let dropped = self
                .pipeline
                .columns
                .lock()
                .retain_near(center, self.config.view_distance * 2);
            if dropped > 0 {
                tracing::debug!("dropped {} distant compressed columns", dropped);
            }
            self.prefetch_ground(position);
        }

        let Some(ring) = self.pending_ring.clone() else {
            return TickOutcome::Unchanged;
        };
        self.state = CoordinatorState::Requesting;

        let update = self
            .pipeline
            .patches
            .ensure_coverage(position, self.config.view_distance)
            .await;
        if self.pipeline.signal.is_aborted() {
            return self.stop();
        }
        self.pipeline.resolver.apply_coverage(&update);

        let missing = self.pipeline.columns.lock().missing(&ring);
        if !missing.is_empty() {
            self.request(&missing);
            tracing::debug!("ring around {} waiting for {} columns", center, missing.len());
            return TickOutcome::Waiting {
                missing: missing.len(),
            };
        }

        let mut chunks = Vec::with_capacity(ring.len());
        let mut failed = Vec::new();
        for key in &ring {
            match self.assemble_column(*key) {
                Ok(mut column) => chunks.append(&mut column),
                Err(e) => {
                    tracing::warn!("{}", e);
                    self.pipeline.columns.lock().remove(*key);
                    self.requested.remove(key);
                    failed.push(*key);
                }
            }
        }

        if !failed.is_empty() {
            return TickOutcome::Waiting {
                missing: failed.len(),
            };
        }
        if self.pipeline.signal.is_aborted() {
            return self.stop();
        }

        let ids: Vec<ChunkId> = chunks.iter().map(|chunk| chunk.id).collect();
        let count = chunks.len();
        for chunk in chunks {
            self.collaborators.viewer.submit_chunk(chunk);
        }
        self.collaborators.viewer.set_visible_chunks(&ids);
        tracing::info!("ring around {} visible ({} chunks)", center, count);

        self.visible = ids;
        self.pending_ring = None;
        self.state = CoordinatorState::Watching;
        TickOutcome::Rendered { chunks: count }
    }

    /// Stores a column delivered by the network.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the message key is not `x:z`.
    pub fn ingest(&mut self, message: ColumnMessage) -> TerrainResult<()> {
        let key: PatchKey = message.key.parse()?;
        self.requested.remove(&key);
        self.pipeline
            .columns
            .lock()
            .insert(key, message.compressed_column);
        Ok(())
    }

    /// Runs until the session is aborted.
    ///
    /// Polls on the configured interval, adjusts LOD on the faster LOD
    /// interval (late LOD ticks are skipped) and ingests column messages as
    /// they arrive.
    pub async fn run(&mut self, mut messages: mpsc::Receiver<ColumnMessage>) -> CoordinatorState {
        let signal = self.pipeline.signal.clone();
        let mut poll = tokio::time::interval(self.config.poll_interval());
        let mut lod = tokio::time::interval(self.config.lod_interval());
        lod.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut inbox_open = true;

        tracing::info!(
            "streaming started (view distance {}, poll {} ms)",
            self.config.view_distance,
            self.config.poll_interval_ms
        );

        loop {
            tokio::select! {
                biased;

                () = signal.aborted() => break,
                _ = poll.tick() => {
                    if self.tick().await == TickOutcome::Stopped {
                        break;
                    }
                }
                message = messages.recv(), if inbox_open => match message {
                    Some(message) => {
                        if let Err(e) = self.ingest(message) {
                            tracing::warn!("dropping column message: {}", e);
                        }
                    }
                    None => inbox_open = false,
                },
                _ = lod.tick() => {
                    if let Some(position) = self.collaborators.player.position() {
                        self.collaborators.viewer.update_lod(position);
                    }
                }
            }
        }

        tracing::info!("streaming stopped");
        self.stop();
        self.state
    }

    fn stop(&mut self) -> TickOutcome {
        self.state = CoordinatorState::Stopped;
        TickOutcome::Stopped
    }

    fn request(&mut self, missing: &[PatchKey]) {
        let fresh: Vec<PatchKey> = missing
            .iter()
            .copied()
            .filter(|key| self.requested.insert(*key))
            .collect();
        if !fresh.is_empty() {
            tracing::debug!("requesting {} columns", fresh.len());
            self.collaborators.requester.request_columns(&fresh);
        }
    }

    fn prefetch_ground(&self, position: WorldPos) {
        let column = position.column();
        let keys: Vec<ColumnKey> = (-PREFETCH_RADIUS..=PREFETCH_RADIUS)
            .flat_map(|dz| {
                (-PREFETCH_RADIUS..=PREFETCH_RADIUS)
                    .map(move |dx| ColumnKey::new(column.x + dx, column.z + dz))
            })
            .collect();
        // fire and forget: results land in the resolver memo
        let _ = self.pipeline.resolver.resolve_batch(&keys);
    }

    /// Decodes one column and turns it into chunks for every streamed slab.
    fn assemble_column(&self, key: PatchKey) -> TerrainResult<Vec<Chunk>> {
        let decode_error = |reason: String| TerrainError::Decompression {
            key: key.to_string(),
            reason,
        };

        let bytes = self
            .pipeline
            .columns
            .lock()
            .get(key)
            .ok_or_else(|| decode_error("column left the cache".to_string()))?;
        let mut stubs = self
            .pipeline
            .decoder
            .decompress(&bytes)
            .map_err(|e| decode_error(e.to_string()))?;

        let ids = ring::chunk_ids(&[key], self.config.min_chunk_y, self.config.max_chunk_y);
        let mut chunks = Vec::with_capacity(ids.len());
        for id in ids {
            let stub = stubs
                .iter()
                .position(|stub| stub.y == id.y)
                .map_or_else(|| ChunkStub::local(id.y), |i| stubs.swap_remove(i));
            let chunk = self
                .pipeline
                .assembler
                .chunk_from_stub(id, stub)
                .map_err(|e| decode_error(e.to_string()))?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }
}
