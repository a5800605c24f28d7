//! # TERRAVOX
//!
//! Ties the terrain crates together into something that can be run.
//!
//! ## Crates
//!
//! - `shared`: coordinates, block types, patches, the generator contract
//! - `procedural`: noise-driven `TerrainGenerator`
//! - `streaming`: caches, worker pool, assembler and coordinator
//!
//! ## Modules
//!
//! - `probe`: headless collaborators used by the `terrain_probe` binary

#![deny(unsafe_code)]

pub mod probe;

// Re-export the crates
pub use terravox_procedural as procedural;
pub use terravox_shared as shared;
pub use terravox_streaming as streaming;

pub use probe::{build_runtime, LocalColumnServer, LoggingViewer, ProbeReport, WalkingPlayer};
