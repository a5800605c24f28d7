//! # TERRAVOX Shared
//!
//! Terrain data model shared by the generator and the streaming cache.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `tokio` or any other runtime
//! - Any cache or worker machinery
//!
//! Patches built here are immutable once constructed. Caches replace them,
//! they never mutate them.

#![deny(unsafe_code)]

pub mod block;
pub mod coords;
pub mod generator;
pub mod patch;

pub use block::BlockType;
pub use coords::{ChunkId, ColumnKey, ParseKeyError, PatchBounds, PatchKey, WorldPos};
pub use generator::{GenerationError, TerrainGenerator};
pub use patch::{ColumnResult, Decoration, DecorationKind, GroundSample, Patch};
