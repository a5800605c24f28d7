//! # TERRAVOX Streaming
//!
//! Fetches, caches, deduplicates and assembles voxel ground data into
//! renderer-ready chunk buffers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────┐
//! │  Streaming   │ ─▶ │ Patch Cache  │ ─▶ │    Chunk     │ ─▶ │ Viewer   │
//! │ Coordinator  │    │ + Resolver   │    │  Assembler   │    │ (extern) │
//! └──────────────┘    └──────────────┘    └──────────────┘    └──────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌──────────────┐    ┌──────────────┐
//! │ Column Cache │    │ Worker Pool  │ ─▶ TerrainGenerator (extern)
//! │    (LZ4)     │    │  (threads)   │
//! └──────────────┘    └──────────────┘
//! ```
//!
//! Everything hangs off a [`TerrainSession`]: there are no global caches,
//! so independent sessions (and tests) can run side by side.
//!
//! ## Concurrency
//!
//! Terrain generation runs on a fixed pool of OS threads. Cache state lives
//! behind short `parking_lot` critical sections that never span an await;
//! in-flight work is deduplicated per key and delivered through tokio
//! channels.

#![deny(unsafe_code)]

pub mod assembler;
pub mod chunk;
pub mod codec;
pub mod column_cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ground;
pub mod patch_cache;
pub mod ring;
pub mod session;
pub mod signal;
pub mod worker;

pub use assembler::{ChunkAssembler, WritePass};
pub use chunk::{Chunk, VoxelData, VoxelOrdering};
pub use codec::{ChunkStub, CodecError, ColumnDecoder, Lz4ColumnCodec};
pub use column_cache::CompressedColumnCache;
pub use config::TerrainConfig;
pub use coordinator::{
    Collaborators, ColumnMessage, ColumnRequester, CoordinatorState, PlayerTracker,
    StreamingCoordinator, TickOutcome, VoxelmapViewer,
};
pub use error::{TerrainError, TerrainResult};
pub use ground::{GroundBlockResolver, PendingColumn, Resolution};
pub use patch_cache::{CoverageUpdate, PatchCache};
pub use session::TerrainSession;
pub use signal::AbortSignal;
pub use worker::{PendingReply, PoolStats, RequestId, WorkerPool, WorkerRequest, WorkerResponse};
