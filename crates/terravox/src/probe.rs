//! # Probe Collaborators
//!
//! Headless stand-ins for the player, the renderer and the column server.
//! They let a streaming session run end to end without a window or a
//! network connection.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use terravox_shared::{ChunkId, PatchKey, WorldPos};
use terravox_streaming::{
    Chunk, ChunkStub, ColumnMessage, ColumnRequester, Lz4ColumnCodec, PlayerTracker,
    VoxelmapViewer,
};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Builds the multi-threaded runtime the probe runs on.
///
/// Timers drive the streaming loop and the signal driver backs Ctrl-C.
///
/// # Errors
///
/// Returns the I/O error if the runtime cannot start.
pub fn build_runtime(worker_threads: usize) -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .thread_name("terravox-probe")
        .enable_all()
        .build()
}

/// A player that walks along +X one step at a time.
pub struct WalkingPlayer {
    position: Mutex<WorldPos>,
    stride: f64,
}

impl WalkingPlayer {
    /// Creates a player at `start` that moves `stride` blocks per step.
    #[must_use]
    pub fn new(start: WorldPos, stride: f64) -> Self {
        Self {
            position: Mutex::new(start),
            stride,
        }
    }

    /// Takes one step and returns the new position.
    pub fn step(&self) -> WorldPos {
        let mut position = self.position.lock();
        position.x += self.stride;
        *position
    }
}

impl PlayerTracker for WalkingPlayer {
    fn position(&self) -> Option<WorldPos> {
        Some(*self.position.lock())
    }
}

/// Totals collected by a [`LoggingViewer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Chunks handed to the viewer.
    pub chunks: u64,
    /// Chunks that held at least one voxel.
    pub solid_chunks: u64,
    /// Visible-set swaps.
    pub rings: u64,
    /// LOD adjustments.
    pub lod_updates: u64,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rings, {} chunks ({} solid), {} LOD updates",
            self.rings, self.chunks, self.solid_chunks, self.lod_updates
        )
    }
}

/// A renderer that only counts and logs what it receives.
#[derive(Default)]
pub struct LoggingViewer {
    chunks: AtomicU64,
    solid_chunks: AtomicU64,
    rings: AtomicU64,
    lod_updates: AtomicU64,
}

impl LoggingViewer {
    /// Creates an empty viewer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn report(&self) -> ProbeReport {
        ProbeReport {
            chunks: self.chunks.load(Ordering::Relaxed),
            solid_chunks: self.solid_chunks.load(Ordering::Relaxed),
            rings: self.rings.load(Ordering::Relaxed),
            lod_updates: self.lod_updates.load(Ordering::Relaxed),
        }
    }
}

impl VoxelmapViewer for LoggingViewer {
    fn submit_chunk(&self, chunk: Chunk) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        if !chunk.is_empty() {
            self.solid_chunks.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                "chunk {} holds {} voxels",
                chunk.id,
                chunk.voxel_data.solid_count()
            );
        }
    }

    fn set_visible_chunks(&self, ids: &[ChunkId]) {
        self.rings.fetch_add(1, Ordering::Relaxed);
        tracing::info!("viewer now shows {} chunks", ids.len());
    }

    fn update_lod(&self, _camera: WorldPos) {
        self.lod_updates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Answers column requests locally.
///
/// Every requested column comes back as an LZ4 column of stubs without
/// voxels, so the client assembles all slabs from its own ground data.
pub struct LocalColumnServer {
    outbox: mpsc::Sender<ColumnMessage>,
    codec: Lz4ColumnCodec,
    slabs: (i32, i32),
    served: AtomicU64,
}

impl LocalColumnServer {
    /// Creates a server that answers on `outbox` for slabs `min_y..=max_y`.
    #[must_use]
    pub fn new(outbox: mpsc::Sender<ColumnMessage>, min_y: i32, max_y: i32) -> Self {
        Self {
            outbox,
            codec: Lz4ColumnCodec,
            slabs: (min_y, max_y),
            served: AtomicU64::new(0),
        }
    }

    /// Columns answered so far.
    #[must_use]
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    fn encode(&self, key: PatchKey) -> ColumnMessage {
        let (min_y, max_y) = self.slabs;
        let stubs: Vec<ChunkStub> = (min_y..=max_y).map(ChunkStub::local).collect();
        ColumnMessage {
            key: key.to_string(),
            compressed_column: self.codec.compress(&stubs),
        }
    }
}

impl ColumnRequester for LocalColumnServer {
    fn request_columns(&self, keys: &[PatchKey]) {
        for key in keys {
            match self.outbox.try_send(self.encode(*key)) {
                Ok(()) => {
                    self.served.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => tracing::warn!("column {} not delivered: {}", key, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terravox_streaming::ColumnDecoder;

    #[test]
    fn test_runtime_supports_ctrl_c_and_timers() {
        let runtime = build_runtime(1).unwrap();
        let timed_out = runtime.block_on(async {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => false,
                () = tokio::time::sleep(std::time::Duration::from_millis(20)) => true,
            }
        });
        assert!(timed_out);
    }

    #[test]
    fn test_player_walks_along_x() {
        let player = WalkingPlayer::new(WorldPos::new(1.0, 80.0, 5.0), 16.0);
        assert_eq!(player.step(), WorldPos::new(17.0, 80.0, 5.0));
        assert_eq!(player.position(), Some(WorldPos::new(17.0, 80.0, 5.0)));
    }

    #[test]
    fn test_server_answers_every_key() {
        let (tx, mut rx) = mpsc::channel(8);
        let server = LocalColumnServer::new(tx, 0, 3);

        server.request_columns(&[PatchKey::new(0, 0), PatchKey::new(-2, 5)]);
        assert_eq!(server.served(), 2);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, "0:0");
        let stubs = Lz4ColumnCodec.decompress(&first.compressed_column).unwrap();
        assert_eq!(stubs.len(), 4);
        assert!(stubs.iter().all(|stub| stub.voxels.is_none()));
        assert_eq!(rx.try_recv().unwrap().key, "-2:5");
    }

    #[test]
    fn test_full_outbox_is_not_counted() {
        let (tx, _rx) = mpsc::channel(1);
        let server = LocalColumnServer::new(tx, 0, 0);

        server.request_columns(&[PatchKey::new(0, 0), PatchKey::new(1, 0)]);
        assert_eq!(server.served(), 1);
    }

    #[test]
    fn test_viewer_counts() {
        let viewer = LoggingViewer::new();
        viewer.set_visible_chunks(&[ChunkId::new(0, 0, 0)]);
        viewer.update_lod(WorldPos::default());

        let report = viewer.report();
        assert_eq!(report.rings, 1);
        assert_eq!(report.lod_updates, 1);
        assert_eq!(report.chunks, 0);
        assert_eq!(report.to_string(), "1 rings, 0 chunks (0 solid), 1 LOD updates");
    }
}
