//! # Terrain Generation Collaborator
//!
//! The streaming cache never generates terrain itself. It calls a
//! `TerrainGenerator` from its worker threads and commits the plain data
//! that comes back.

use thiserror::Error;

use crate::coords::{ColumnKey, PatchKey};
use crate::patch::{ColumnResult, Patch};

/// Errors raised while generating terrain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Patch size must be non-zero.
    #[error("invalid patch size: {0}")]
    InvalidPatchSize(u32),

    /// A patch was built with the wrong number of samples.
    #[error("patch sample count mismatch: expected {expected}, got {actual}")]
    SampleCount {
        /// Samples required.
        expected: usize,
        /// Samples supplied.
        actual: usize,
    },

    /// A decoration template does not match its declared size.
    #[error("decoration block count mismatch: expected {expected}, got {actual}")]
    DecorationSize {
        /// Blocks required.
        expected: usize,
        /// Blocks supplied.
        actual: usize,
    },

    /// The generator could not produce the requested data.
    #[error("terrain generation failed: {0}")]
    Failed(String),
}

/// Produces terrain data on demand.
///
/// Implementations must be pure functions of their inputs: the cache
/// relies on a column always yielding the same ground for the same seed.
pub trait TerrainGenerator: Send + Sync {
    /// Generates the patch at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch cannot be generated.
    fn generate_patch(&self, key: PatchKey, patch_size: u32) -> Result<Patch, GenerationError>;

    /// Returns the top ground voxel of a single column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column cannot be evaluated.
    fn peak_position(&self, column: ColumnKey) -> Result<ColumnResult, GenerationError>;

    /// Batched variant of [`TerrainGenerator::peak_position`].
    ///
    /// # Errors
    ///
    /// Fails as a whole if any column fails.
    fn peak_batch(&self, columns: &[ColumnKey]) -> Result<Vec<ColumnResult>, GenerationError> {
        columns.iter().map(|column| self.peak_position(*column)).collect()
    }
}
