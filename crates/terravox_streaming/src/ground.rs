//! # Ground Block Resolver
//!
//! Answers "what is the top ground voxel of column (x, z)?" without ever
//! computing the same column twice at the same time.
//!
//! ## Lookup order
//!
//! 1. Memo (bounded LRU): answered synchronously
//! 2. In-flight map: the caller shares the pending handle
//! 3. Patch cache: read synchronously, memoised
//! 4. Worker pool: one `PeakPosition` (or one `BlockBatch` for a batch)
//!
//! ## Invalidation
//!
//! Memoised columns of a patch are dropped when that patch is evicted or
//! refreshed. Each invalidation bumps an epoch; a resolution that started
//! before the bump still reaches its waiters but is not memoised.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use terravox_shared::{ColumnKey, ColumnResult, PatchKey};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::{TerrainError, TerrainResult};
use crate::patch_cache::{CoverageUpdate, PatchCache};
use crate::signal::AbortSignal;
use crate::worker::{WorkerPool, WorkerRequest};

type Slot = Option<TerrainResult<ColumnResult>>;

/// Shared handle to a column resolution in flight.
///
/// Every caller asking for the same column while it is pending receives a
/// clone of the same handle.
#[derive(Clone, Debug)]
pub struct PendingColumn {
    key: ColumnKey,
    receiver: watch::Receiver<Slot>,
}

impl PendingColumn {
    /// Column being resolved.
    #[must_use]
    pub const fn key(&self) -> ColumnKey {
        self.key
    }

    /// Result if it has arrived.
    #[must_use]
    pub fn try_get(&self) -> Option<TerrainResult<ColumnResult>> {
        self.receiver.borrow().clone()
    }

    /// Returns true if both handles observe the same resolution.
    #[must_use]
    pub fn same_resolution(&self, other: &Self) -> bool {
        self.receiver.same_channel(&other.receiver)
    }

    /// Waits for the result.
    ///
    /// # Errors
    ///
    /// Returns the resolution error, `Aborted` if the session was aborted
    /// first, or `WorkerUnavailable` if the resolution was dropped.
    pub async fn wait(mut self) -> TerrainResult<ColumnResult> {
        let result = match self.receiver.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone().unwrap_or(Err(TerrainError::WorkerUnavailable)),
            Err(_) => Err(TerrainError::WorkerUnavailable),
        };
        result
    }
}

/// Outcome of [`GroundBlockResolver::resolve`].
#[derive(Clone, Debug)]
pub enum Resolution {
    /// Known now.
    Ready(ColumnResult),
    /// Being computed.
    Pending(PendingColumn),
}

impl Resolution {
    /// The value if it is known now.
    #[must_use]
    pub const fn ready(&self) -> Option<ColumnResult> {
        match self {
            Self::Ready(result) => Some(*result),
            Self::Pending(_) => None,
        }
    }

    /// Waits until the value is known.
    ///
    /// # Errors
    ///
    /// As [`PendingColumn::wait`].
    pub async fn wait(self) -> TerrainResult<ColumnResult> {
        match self {
            Self::Ready(result) => Ok(result),
            Self::Pending(pending) => pending.wait().await,
        }
    }
}

struct ResolverState {
    memo: LruCache<ColumnKey, ColumnResult>,
    in_flight: HashMap<ColumnKey, PendingColumn>,
    epoch: u64,
}

impl ResolverState {
    /// Clears in-flight markers and memoises results from `epoch`.
    fn commit(&mut self, epoch: u64, results: &[(ColumnKey, TerrainResult<ColumnResult>)]) {
        for (key, result) in results {
            self.in_flight.remove(key);
            match result {
                Ok(column) if epoch == self.epoch => {
                    self.memo.put(*key, *column);
                }
                Ok(_) => tracing::trace!("column {} resolved across an invalidation", key),
                Err(e) => tracing::debug!("column {} failed to resolve: {}", key, e),
            }
        }
    }
}

/// Deduplicating, memoising ground column resolver.
pub struct GroundBlockResolver {
    state: Arc<Mutex<ResolverState>>,
    patches: Arc<PatchCache>,
    pool: Arc<WorkerPool>,
    runtime: Handle,
    signal: AbortSignal,
}

impl GroundBlockResolver {
    /// Creates a resolver memoising up to `capacity` columns (minimum 1).
    ///
    /// Completions are driven on `runtime`.
    #[must_use]
    pub fn new(
        patches: Arc<PatchCache>,
        pool: Arc<WorkerPool>,
        capacity: usize,
        runtime: Handle,
        signal: AbortSignal,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(ResolverState {
                memo: LruCache::new(capacity),
                in_flight: HashMap::new(),
                epoch: 0,
            })),
            patches,
            pool,
            runtime,
            signal,
        }
    }

    /// Resolves the top ground voxel of a column.
    pub fn resolve(&self, key: ColumnKey) -> Resolution {
        let mut state = self.state.lock();
        if let Some(found) = self.lookup(&mut state, key) {
            return found;
        }

        let (sender, pending) = Self::open(&mut state, key);
        let epoch = state.epoch;
        drop(state);

        let reply = self.pool.submit(WorkerRequest::PeakPosition(key));
        let shared = Arc::clone(&self.state);
        let signal = self.signal.clone();
        self.runtime.spawn(async move {
            let result = reply.peak().await;
            Self::complete(&shared, &signal, epoch, vec![(key, result)], vec![sender]);
        });

        Resolution::Pending(pending)
    }

    /// Resolves many columns, sending every miss in a single batch request.
    ///
    /// Results are in the order of `keys`.
    pub fn resolve_batch(&self, keys: &[ColumnKey]) -> Vec<Resolution> {
        let mut state = self.state.lock();
        let mut out = Vec::with_capacity(keys.len());
        let mut misses = Vec::new();
        let mut senders = Vec::new();

        for key in keys {
            if let Some(found) = self.lookup(&mut state, *key) {
                out.push(found);
                continue;
            }
            let (sender, pending) = Self::open(&mut state, *key);
            misses.push(*key);
            senders.push(sender);
            out.push(Resolution::Pending(pending));
        }
        let epoch = state.epoch;
        drop(state);

        if misses.is_empty() {
            return out;
        }

        tracing::trace!("resolving {} columns in one batch", misses.len());
        let reply = self.pool.submit(WorkerRequest::BlockBatch(misses.clone()));
        let shared = Arc::clone(&self.state);
        let signal = self.signal.clone();
        self.runtime.spawn(async move {
            let results = match reply.blocks().await {
                Ok(columns) if columns.len() == misses.len() => {
                    misses.into_iter().zip(columns.into_iter().map(Ok)).collect()
                }
                Ok(columns) => {
                    let err = TerrainError::Protocol(format!(
                        "batch of {} columns answered with {}",
                        misses.len(),
                        columns.len()
                    ));
                    misses.into_iter().map(|key| (key, Err(err.clone()))).collect()
                }
                Err(e) => misses.into_iter().map(|key| (key, Err(e.clone()))).collect(),
            };
            Self::complete(&shared, &signal, epoch, results, senders);
        });

        out
    }

    /// Memo or cached patch only. Never dispatches work.
    #[must_use]
    pub fn peek(&self, key: ColumnKey) -> Option<ColumnResult> {
        if let Some(result) = self.patches.get_column(key) {
            return Some(result);
        }
        self.state.lock().memo.peek(&key).copied()
    }

    /// Ground height at a world position, `NaN` while it is being resolved.
    ///
    /// A miss starts the resolution, so polling every frame converges.
    #[must_use]
    pub fn height_sync(&self, x: f64, z: f64) -> f64 {
        match self.resolve(ColumnKey::from_world(x, z)) {
            Resolution::Ready(result) => f64::from(result.height),
            Resolution::Pending(_) => f64::NAN,
        }
    }

    /// Ground height at a world position.
    ///
    /// # Errors
    ///
    /// Returns an error if the column cannot be resolved.
    pub async fn height(&self, x: f64, z: f64) -> TerrainResult<f64> {
        let resolution = self.resolve(ColumnKey::from_world(x, z));
        resolution.wait().await.map(|result| f64::from(result.height))
    }

    /// Drops memoised columns of a patch.
    ///
    /// Returns the number of columns dropped.
    pub fn invalidate_patch(&self, patch: PatchKey) -> usize {
        let mut state = self.state.lock();
        self.forget(&mut state, patch)
    }

    /// Removes a patch from the patch cache and drops its memoised columns.
    ///
    /// Both happen under the resolver lock, so no concurrent `resolve` can
    /// memoise a column of the old patch in between. Returns true if the
    /// patch was cached.
    pub fn refresh_patch(&self, patch: PatchKey) -> bool {
        let mut state = self.state.lock();
        let cached = self.patches.invalidate(patch);
        self.forget(&mut state, patch);
        cached
    }

    fn forget(&self, state: &mut ResolverState, patch: PatchKey) -> usize {
        let patch_size = self.patches.patch_size();
        state.epoch += 1;

        let stale: Vec<ColumnKey> = state
            .memo
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| key.patch(patch_size) == patch)
            .collect();
        for key in &stale {
            state.memo.pop(key);
        }
        stale.len()
    }

    /// Applies the evictions of a coverage pass.
    pub fn apply_coverage(&self, update: &CoverageUpdate) {
        let dropped: usize = update
            .evicted
            .iter()
            .map(|key| self.invalidate_patch(*key))
            .sum();
        if dropped > 0 {
            tracing::debug!("dropped {} memoised columns of evicted patches", dropped);
        }
    }

    /// Number of memoised columns.
    #[must_use]
    pub fn memo_len(&self) -> usize {
        self.state.lock().memo.len()
    }

    /// Number of columns being resolved.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    fn lookup(&self, state: &mut ResolverState, key: ColumnKey) -> Option<Resolution> {
        if let Some(result) = state.memo.get(&key) {
            return Some(Resolution::Ready(*result));
        }
        if let Some(pending) = state.in_flight.get(&key) {
            return Some(Resolution::Pending(pending.clone()));
        }
        let result = self.patches.get_column(key)?;
        state.memo.put(key, result);
        Some(Resolution::Ready(result))
    }

    fn open(state: &mut ResolverState, key: ColumnKey) -> (watch::Sender<Slot>, PendingColumn) {
        let (sender, receiver) = watch::channel(None);
        let pending = PendingColumn { key, receiver };
        state.in_flight.insert(key, pending.clone());
        (sender, pending)
    }

    fn complete(
        state: &Mutex<ResolverState>,
        signal: &AbortSignal,
        epoch: u64,
        results: Vec<(ColumnKey, TerrainResult<ColumnResult>)>,
        senders: Vec<watch::Sender<Slot>>,
    ) {
        if signal.is_aborted() {
            tracing::trace!("session aborted, discarding {} columns", results.len());
            for sender in senders {
                let _ = sender.send(Some(Err(TerrainError::Aborted)));
            }
            return;
        }

        state.lock().commit(epoch, &results);
        for (sender, (_, result)) in senders.into_iter().zip(results) {
            let _ = sender.send(Some(result));
        }
    }
}
