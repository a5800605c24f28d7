//! # Terrain Session
//!
//! Owns every cache and worker of one streaming session and wires them
//! together. Nothing here is global: two sessions never share state.
//!
//! ## Example
//!
//! ```rust,ignore
//! let session = TerrainSession::new(TerrainConfig::default(), Arc::new(generator))?;
//! session.ensure_coverage(WorldPos::new(0.0, 80.0, 0.0)).await;
//! let height = session.get_ground_height_sync(12.0, -3.0);
//! let chunk = session.build_chunk(ChunkId::new(0, 1, 0));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use terravox_shared::{ChunkId, PatchKey, TerrainGenerator, WorldPos};
use tokio::runtime::Handle;

use crate::assembler::ChunkAssembler;
use crate::chunk::Chunk;
use crate::codec::{ColumnDecoder, Lz4ColumnCodec};
use crate::column_cache::CompressedColumnCache;
use crate::config::TerrainConfig;
use crate::coordinator::{
    Collaborators, ColumnMessage, ColumnRequester, Pipeline, PlayerTracker, StreamingCoordinator,
    VoxelmapViewer,
};
use crate::error::{TerrainError, TerrainResult};
use crate::ground::GroundBlockResolver;
use crate::patch_cache::{CoverageUpdate, PatchCache};
use crate::signal::AbortSignal;
use crate::worker::{PoolStats, WorkerPool};

/// A terrain streaming session.
pub struct TerrainSession {
    config: TerrainConfig,
    signal: AbortSignal,
    pool: Arc<WorkerPool>,
    patches: Arc<PatchCache>,
    resolver: Arc<GroundBlockResolver>,
    assembler: Arc<ChunkAssembler>,
    columns: Arc<Mutex<CompressedColumnCache>>,
    decoder: Arc<dyn ColumnDecoder>,
}

impl TerrainSession {
    /// Starts a session on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an invalid configuration, `NoRuntime` outside a
    /// tokio runtime, or `WorkerUnavailable` if the workers cannot start.
    pub fn new(config: TerrainConfig, generator: Arc<dyn TerrainGenerator>) -> TerrainResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| TerrainError::NoRuntime)?;
        let signal = AbortSignal::new();

        let pool = Arc::new(WorkerPool::new(
            generator,
            config.patch_size,
            config.worker_threads,
        )?);
        let patches = Arc::new(PatchCache::new(
            Arc::clone(&pool),
            config.patch_size,
            config.cache_radius,
            config.cache_power_limit,
            signal.clone(),
        ));
        let resolver = Arc::new(GroundBlockResolver::new(
            Arc::clone(&patches),
            Arc::clone(&pool),
            config.ground_cache_capacity,
            runtime,
            signal.clone(),
        ));
        let assembler = Arc::new(ChunkAssembler::new(
            Arc::clone(&patches),
            Arc::clone(&resolver),
            config.ordering,
        ));
        let columns = Arc::new(Mutex::new(CompressedColumnCache::new(
            config.column_cache_capacity,
        )));

        tracing::info!(
            "terrain session started (patch size {}, radius {}/{})",
            config.patch_size,
            config.cache_radius,
            config.cache_power_limit
        );

        Ok(Self {
            config,
            signal,
            pool,
            patches,
            resolver,
            assembler,
            columns,
            decoder: Arc::new(Lz4ColumnCodec),
        })
    }

    /// Replaces the column decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn ColumnDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Ensures patch coverage around `reference` at the current radius.
    ///
    /// Returns true if the cache changed.
    pub async fn ensure_coverage(&self, reference: WorldPos) -> bool {
        let radius = self.patches.radius();
        self.ensure_coverage_with(reference, radius).await.refreshed
    }

    /// Ensures patch coverage around `reference` at `radius` (grows the
    /// cache radius up to its limit).
    pub async fn ensure_coverage_with(&self, reference: WorldPos, radius: u32) -> CoverageUpdate {
        let update = self.patches.ensure_coverage(reference, radius).await;
        self.resolver.apply_coverage(&update);
        update
    }

    /// Ground height at a world position, `NaN` while it is being resolved.
    #[must_use]
    pub fn get_ground_height_sync(&self, x: f64, z: f64) -> f64 {
        self.resolver.height_sync(x, z)
    }

    /// Ground height at a world position.
    ///
    /// # Errors
    ///
    /// Returns an error if the column cannot be resolved or the session is
    /// aborted first.
    pub async fn get_ground_height(&self, x: f64, z: f64) -> TerrainResult<f64> {
        self.resolver.height(x, z).await
    }

    /// Builds one chunk from the current cache state.
    #[must_use]
    pub fn build_chunk(&self, id: ChunkId) -> Chunk {
        self.assembler.build_chunk(id)
    }

    /// Stores a compressed column delivered outside a running coordinator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the message key is not `x:z`.
    pub fn ingest_column(&self, message: ColumnMessage) -> TerrainResult<()> {
        let key: PatchKey = message.key.parse()?;
        self.columns.lock().insert(key, message.compressed_column);
        Ok(())
    }

    /// Drops a patch and its memoised columns so they are regenerated.
    ///
    /// Returns true if the patch was cached.
    pub fn invalidate_patch(&self, key: PatchKey) -> bool {
        self.resolver.refresh_patch(key)
    }

    /// Aborts the session. In-flight work finishes but is discarded.
    pub fn abort(&self) {
        tracing::info!("terrain session aborted");
        self.signal.abort();
    }

    /// Returns true once the session is aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }

    /// The session's abort signal.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Creates the streaming coordinator for this session.
    #[must_use]
    pub fn coordinator(
        &self,
        player: Arc<dyn PlayerTracker>,
        viewer: Arc<dyn VoxelmapViewer>,
        requester: Arc<dyn ColumnRequester>,
    ) -> StreamingCoordinator {
        let pipeline = Pipeline {
            patches: Arc::clone(&self.patches),
            resolver: Arc::clone(&self.resolver),
            assembler: Arc::clone(&self.assembler),
            columns: Arc::clone(&self.columns),
            decoder: Arc::clone(&self.decoder),
            signal: self.signal.clone(),
        };
        let collaborators = Collaborators {
            player,
            viewer,
            requester,
        };
        StreamingCoordinator::new(self.config.clone(), pipeline, collaborators)
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// The patch cache.
    #[must_use]
    pub fn patches(&self) -> &PatchCache {
        &self.patches
    }

    /// The ground block resolver.
    #[must_use]
    pub fn resolver(&self) -> &GroundBlockResolver {
        &self.resolver
    }

    /// The chunk assembler.
    #[must_use]
    pub fn assembler(&self) -> &ChunkAssembler {
        &self.assembler
    }

    /// Number of compressed columns cached.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.lock().len()
    }

    /// Worker pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> Arc<PoolStats> {
        self.pool.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingTerrain;

    fn config() -> TerrainConfig {
        TerrainConfig {
            patch_size: 8,
            ..TerrainConfig::default()
        }
    }

    #[test]
    fn test_requires_runtime() {
        let result = TerrainSession::new(config(), Arc::new(CountingTerrain::new(4)));
        assert!(matches!(result, Err(TerrainError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let bad = TerrainConfig {
            worker_threads: 0,
            ..config()
        };
        let result = TerrainSession::new(bad, Arc::new(CountingTerrain::new(4)));
        assert!(matches!(result, Err(TerrainError::Config(_))));
    }

    #[tokio::test]
    async fn test_ground_height_through_session() {
        let session = TerrainSession::new(config(), Arc::new(CountingTerrain::new(4))).unwrap();
        assert!(session.ensure_coverage(WorldPos::default()).await);
        assert!(!session.ensure_coverage(WorldPos::default()).await);

        assert_eq!(session.get_ground_height_sync(3.5, -2.5), 4.0);
        assert_eq!(session.get_ground_height(100.0, 100.0).await.unwrap(), 4.0);
        assert!(!session.build_chunk(ChunkId::new(0, 0, 0)).is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_patch_drops_both_caches() {
        let session = TerrainSession::new(config(), Arc::new(CountingTerrain::new(4))).unwrap();
        session.ensure_coverage(WorldPos::default()).await;
        assert_eq!(session.get_ground_height_sync(1.0, 1.0), 4.0);

        assert!(session.invalidate_patch(PatchKey::new(0, 0)));
        assert!(session.build_chunk(ChunkId::new(0, 0, 0)).is_empty());
        assert!(session.resolver().peek(terravox_shared::ColumnKey::new(1, 1)).is_none());
    }

    #[tokio::test]
    async fn test_ingest_column_parses_key() {
        let session = TerrainSession::new(config(), Arc::new(CountingTerrain::new(4))).unwrap();
        let ok = ColumnMessage {
            key: "3:-2".to_string(),
            compressed_column: vec![1, 2, 3],
        };
        let bad = ColumnMessage {
            key: "3/-2".to_string(),
            compressed_column: Vec::new(),
        };
        assert!(session.ingest_column(ok).is_ok());
        assert!(matches!(session.ingest_column(bad), Err(TerrainError::InvalidKey(_))));
        assert_eq!(session.column_count(), 1);
    }
}
