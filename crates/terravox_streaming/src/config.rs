//! # Terrain Configuration
//!
//! Tunables for a terrain session, loadable from TOML.
//!
//! ```toml
//! patch_size = 64
//! cache_radius = 1
//! cache_power_limit = 4
//! view_distance = 2
//! ordering = "zxy"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::VoxelOrdering;
use crate::error::{TerrainError, TerrainResult};

/// Largest accepted patch size. A padded chunk of this size is ~35 MB.
pub const MAX_PATCH_SIZE: u32 = 256;

/// Configuration for a terrain session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainConfig {
    /// Side length of a patch (and chunk) in world units.
    pub patch_size: u32,
    /// Initial patch cache radius, in patches.
    pub cache_radius: u32,
    /// Maximum radius the patch cache may grow to.
    pub cache_power_limit: u32,
    /// Memoised ground columns kept by the resolver.
    pub ground_cache_capacity: usize,
    /// Compressed chunk columns kept by the column cache.
    pub column_cache_capacity: usize,
    /// Ring radius, in chunk columns, that must be visible.
    pub view_distance: u32,
    /// Lowest chunk slab index streamed.
    pub min_chunk_y: i32,
    /// Highest chunk slab index streamed.
    pub max_chunk_y: i32,
    /// Player polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// LOD adjustment interval in milliseconds.
    pub lod_interval_ms: u64,
    /// Terrain worker threads.
    pub worker_threads: usize,
    /// Voxel layout handed to the renderer.
    pub ordering: VoxelOrdering,
    /// World seed for the procedural generator.
    pub seed: u64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            patch_size: 64,
            cache_radius: 1,
            cache_power_limit: 4,
            ground_cache_capacity: 1000,
            column_cache_capacity: 1024,
            view_distance: 2,
            min_chunk_y: 0,
            max_chunk_y: 3,
            poll_interval_ms: 1000,
            lod_interval_ms: 200,
            worker_threads: 2,
            ordering: VoxelOrdering::Zxy,
            seed: 12345,
        }
    }
}

impl TerrainConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `TerrainError::Config` if the document is malformed or fails
    /// validation.
    pub fn from_toml_str(source: &str) -> TerrainResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| TerrainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `TerrainError::Config` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| TerrainError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks the configuration for values the session cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `TerrainError::Config` naming the first offending field.
    pub fn validate(&self) -> TerrainResult<()> {
        let fail = |msg: String| Err(TerrainError::Config(msg));

        if self.patch_size == 0 || self.patch_size > MAX_PATCH_SIZE {
            return fail(format!(
                "patch_size must be in 1..={MAX_PATCH_SIZE}, got {}",
                self.patch_size
            ));
        }
        if self.cache_radius > self.cache_power_limit {
            return fail(format!(
                "cache_radius {} exceeds cache_power_limit {}",
                self.cache_radius, self.cache_power_limit
            ));
        }
        if self.view_distance > self.cache_power_limit {
            return fail(format!(
                "view_distance {} exceeds cache_power_limit {}",
                self.view_distance, self.cache_power_limit
            ));
        }
        if self.ground_cache_capacity == 0 || self.column_cache_capacity == 0 {
            return fail("cache capacities must be non-zero".to_string());
        }
        let retained = self.retained_columns();
        if self.column_cache_capacity < retained {
            return fail(format!(
                "column_cache_capacity {} cannot hold the {} columns kept around the player",
                self.column_cache_capacity, retained
            ));
        }
        if self.min_chunk_y > self.max_chunk_y {
            return fail(format!(
                "min_chunk_y {} is above max_chunk_y {}",
                self.min_chunk_y, self.max_chunk_y
            ));
        }
        if self.poll_interval_ms == 0 || self.lod_interval_ms == 0 {
            return fail("intervals must be non-zero".to_string());
        }
        if self.worker_threads == 0 {
            return fail("worker_threads must be at least 1".to_string());
        }
        Ok(())
    }

    /// Columns kept around the player: the square of side
    /// `4 * view_distance + 1` that distance pruning leaves in place.
    #[must_use]
    pub fn retained_columns(&self) -> usize {
        let side = 4 * self.view_distance as usize + 1;
        side * side
    }

    /// Player polling interval.
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// LOD adjustment interval.
    #[inline]
    #[must_use]
    pub const fn lod_interval(&self) -> Duration {
        Duration::from_millis(self.lod_interval_ms)
    }
}
