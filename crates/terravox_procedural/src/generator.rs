//! # Patch Generator
//!
//! Procedural implementation of the `TerrainGenerator` collaborator.
//!
//! ## Passes
//!
//! 1. Ground: one `GroundSample` per column, layered by biome
//! 2. Decorations: trees and boulders anchored on columns of this patch
//! 3. Flags: biome-transition markers used for blending and debug views
//!
//! A column evaluated alone through `peak_position` always matches the same
//! column evaluated as part of a patch.

use terravox_shared::{
    BlockType, ColumnKey, ColumnResult, Decoration, DecorationKind, GenerationError, GroundSample,
    Patch, PatchKey, TerrainGenerator,
};

use crate::biome::{Biome, BiomeClassifier};
use crate::noise::WorldSeed;

/// Procedural terrain generator.
pub struct ProceduralTerrain {
    classifier: BiomeClassifier,
    tree_seed: WorldSeed,
    rock_seed: WorldSeed,
    sea_level: i32,
    amplitude: i32,
}

impl ProceduralTerrain {
    /// Default sea level.
    pub const DEFAULT_SEA_LEVEL: i32 = 64;

    /// Default height swing above and below sea level.
    pub const DEFAULT_AMPLITUDE: i32 = 48;

    const TREE_MIN_HEIGHT: u32 = 4;
    const TREE_MAX_HEIGHT: u32 = 6;
    const CANOPY_RADIUS: i32 = 2;

    /// Creates a generator for a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            classifier: BiomeClassifier::new(seed),
            tree_seed: seed.derive(100),
            rock_seed: seed.derive(101),
            sea_level: Self::DEFAULT_SEA_LEVEL,
            amplitude: Self::DEFAULT_AMPLITUDE,
        }
    }

    /// Sets the sea level.
    #[must_use]
    pub const fn with_sea_level(mut self, level: i32) -> Self {
        self.sea_level = level;
        self
    }

    /// Sets the height amplitude.
    #[must_use]
    pub const fn with_amplitude(mut self, amplitude: i32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Evaluates one column: ground sample plus biome.
    #[must_use]
    pub fn column(&self, column: ColumnKey) -> (GroundSample, Biome) {
        let fx = f64::from(column.x);
        let fz = f64::from(column.z);

        let biome = self.classifier.classify(fx, fz);
        let ground = self.classifier.ground_height(fx, fz, self.sea_level, self.amplitude);
        let (primary, mut layers) = biome.ground_profile();

        // flooded columns: water layers sit on top of the sea bed
        let height = if ground < self.sea_level {
            let depth = (self.sea_level - ground) as usize;
            let mut flooded = vec![BlockType::WATER; depth];
            flooded.append(&mut layers);
            layers = flooded;
            self.sea_level
        } else {
            ground
        };

        let sample = GroundSample::new(height, primary)
            .with_buffer(layers)
            .with_sub_type(biome as u8);
        (sample, biome)
    }

    fn tree(&self, column: ColumnKey, ground: i32) -> Result<Decoration, GenerationError> {
        let span = Self::TREE_MAX_HEIGHT - Self::TREE_MIN_HEIGHT + 1;
        let roll = self.tree_seed.derive(7).column_hash(column.x, column.z);
        let trunk = Self::TREE_MIN_HEIGHT + ((roll * f64::from(span)) as u32).min(span - 1);

        let r = Self::CANOPY_RADIUS;
        let side = (2 * r + 1) as u32;
        // trunk is rooted in the ground voxel, canopy covers the top rows
        let height = trunk + 2;
        let mut blocks = vec![BlockType::NONE; (side * side * height) as usize];
        let index = |x: u32, y: u32, z: u32| (x + side * (z + side * y)) as usize;

        for y in 0..height {
            let canopy = y + 3 >= height;
            for dz in -r..=r {
                for dx in -r..=r {
                    let (lx, lz) = ((dx + r) as u32, (dz + r) as u32);
                    if dx == 0 && dz == 0 && y < trunk {
                        blocks[index(lx, y, lz)] = BlockType::TRUNK;
                    } else if canopy && dx * dx + dz * dz <= r * r + 1 {
                        blocks[index(lx, y, lz)] = BlockType::FOLIAGE;
                    }
                }
            }
        }

        Decoration::new(
            DecorationKind::Tree,
            [column.x - r, ground, column.z - r],
            [side, height, side],
            blocks,
        )
    }

    fn boulder(column: ColumnKey, ground: i32) -> Result<Decoration, GenerationError> {
        Decoration::new(
            DecorationKind::Rock,
            [column.x, ground + 1, column.z],
            [2, 1, 2],
            vec![BlockType::BOULDER; 4],
        )
    }

    fn decoration_for(
        &self,
        column: ColumnKey,
        sample: &GroundSample,
        biome: Biome,
    ) -> Result<Option<Decoration>, GenerationError> {
        // nothing grows under water
        if sample.top_block() == BlockType::WATER {
            return Ok(None);
        }
        if self.tree_seed.column_hash(column.x, column.z) < biome.tree_chance() {
            return self.tree(column, sample.height).map(Some);
        }
        if self.rock_seed.column_hash(column.x, column.z) < biome.rock_chance() {
            return Self::boulder(column, sample.height).map(Some);
        }
        Ok(None)
    }
}

impl TerrainGenerator for ProceduralTerrain {
    fn generate_patch(&self, key: PatchKey, patch_size: u32) -> Result<Patch, GenerationError> {
        if patch_size == 0 {
            return Err(GenerationError::InvalidPatchSize(patch_size));
        }

        let origin = key.bounds(patch_size).min;
        let mut samples = Vec::with_capacity((patch_size * patch_size) as usize);
        let mut decorations = Vec::new();
        let mut biomes = Vec::with_capacity(samples.capacity());

        for local_z in 0..patch_size as i32 {
            for local_x in 0..patch_size as i32 {
                let column = ColumnKey::new(origin.x + local_x, origin.z + local_z);
                let (sample, biome) = self.column(column);
                if let Some(decoration) = self.decoration_for(column, &sample, biome)? {
                    decorations.push(decoration);
                }
                samples.push(sample);
                biomes.push(biome);
            }
        }

        let first = biomes[0];
        let is_biome_transition = biomes.iter().any(|b| *b != first);

        // a patch is a transition patch if its neighbours' centres disagree
        // with its own, even when the patch itself is uniform
        let half = (patch_size / 2) as i32;
        let centre_of = |k: PatchKey| {
            let min = k.bounds(patch_size).min;
            self.classifier
                .classify(f64::from(min.x + half), f64::from(min.z + half))
        };
        let own = centre_of(key);
        let is_transition_patch = is_biome_transition
            || [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .iter()
                .any(|(dx, dz)| centre_of(key.offset(*dx, *dz)) != own);

        tracing::trace!(
            "patch {} generated ({} decorations, transition: {})",
            key,
            decorations.len(),
            is_transition_patch
        );
        Ok(Patch::new(key, patch_size, samples, decorations)?
            .with_transition_flags(is_transition_patch, is_biome_transition))
    }

    fn peak_position(&self, column: ColumnKey) -> Result<ColumnResult, GenerationError> {
        Ok(self.column(column).0.column_result())
    }
}
