//! # TERRAVOX Procedural Generation
//!
//! Deterministic terrain generation behind the `TerrainGenerator` trait.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same world
//! 2. **Patch-shaped**: Output is one square patch at a time
//! 3. **Column-consistent**: `peak_position` agrees with `generate_patch`
//!
//! ## Example
//!
//! ```rust,ignore
//! use terravox_procedural::{ProceduralTerrain, WorldSeed};
//! use terravox_shared::{PatchKey, TerrainGenerator};
//!
//! let terrain = ProceduralTerrain::new(WorldSeed::new(12345));
//! let patch = terrain.generate_patch(PatchKey::new(0, 0), 64)?;
//! assert_eq!(patch.samples().len(), 64 * 64);
//! ```

#![deny(unsafe_code)]

pub mod biome;
pub mod generator;
pub mod noise;

pub use biome::{Biome, BiomeClassifier};
pub use generator::ProceduralTerrain;
pub use noise::{Fractal, SimplexNoise, WorldSeed};
