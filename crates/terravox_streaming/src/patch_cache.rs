//! # Patch Cache
//!
//! Keeps the square of patches around a reference position generated.
//!
//! ## Coverage
//!
//! `ensure_coverage` computes the `(2r+1)²` square around the reference
//! patch, evicts everything outside it, and asks the worker pool for every
//! missing patch. A patch that is already being generated is never
//! requested twice. Failed patches stay missing and are retried by the next
//! call.
//!
//! ## Radius
//!
//! The radius grows on demand up to `power_limit` and never shrinks on its
//! own; only [`PatchCache::set_radius`] can reduce it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use terravox_shared::{ColumnKey, ColumnResult, Patch, PatchKey, WorldPos};

use crate::signal::AbortSignal;
use crate::worker::{WorkerPool, WorkerRequest};

/// What an `ensure_coverage` pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageUpdate {
    /// Patch under the reference position.
    pub center: PatchKey,
    /// Radius the pass covered.
    pub radius: u32,
    /// The cache contents changed.
    pub refreshed: bool,
    /// Patches generated and inserted.
    pub generated: Vec<PatchKey>,
    /// Patches evicted for being out of range.
    pub evicted: Vec<PatchKey>,
    /// Patches whose generation failed.
    pub failed: Vec<PatchKey>,
}

struct CacheState {
    patches: HashMap<PatchKey, Arc<Patch>>,
    pending: HashSet<PatchKey>,
    radius: u32,
    center: Option<PatchKey>,
}

impl CacheState {
    fn in_range(&self, key: PatchKey) -> bool {
        self.center
            .map_or(true, |center| key.ring_distance(center) <= self.radius)
    }
}

/// Patch cache around a moving reference position.
pub struct PatchCache {
    patch_size: u32,
    power_limit: u32,
    pool: Arc<WorkerPool>,
    signal: AbortSignal,
    state: Mutex<CacheState>,
}

/// Clears pending markers even if the coverage future is dropped mid-flight.
struct PendingGuard<'a> {
    cache: &'a PatchCache,
    keys: Vec<PatchKey>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock();
        for key in &self.keys {
            state.pending.remove(key);
        }
    }
}

impl PatchCache {
    /// Creates an empty cache.
    ///
    /// `radius` is clamped to `power_limit`.
    #[must_use]
    pub fn new(
        pool: Arc<WorkerPool>,
        patch_size: u32,
        radius: u32,
        power_limit: u32,
        signal: AbortSignal,
    ) -> Self {
        Self {
            patch_size,
            power_limit,
            pool,
            signal,
            state: Mutex::new(CacheState {
                patches: HashMap::new(),
                pending: HashSet::new(),
                radius: radius.min(power_limit),
                center: None,
            }),
        }
    }

    /// Ensures every patch within `radius` of `reference` is cached.
    ///
    /// The effective radius is the larger of `radius` and the current
    /// radius, capped at the power limit. Calling this again with the same
    /// arguments generates nothing.
    pub async fn ensure_coverage(&self, reference: WorldPos, radius: u32) -> CoverageUpdate {
        let center = PatchKey::from_world(reference, self.patch_size);
        let mut update = CoverageUpdate {
            center,
            ..CoverageUpdate::default()
        };
        if self.signal.is_aborted() {
            return update;
        }

        let requested = {
            let mut state = self.state.lock();
            state.radius = state.radius.max(radius.min(self.power_limit));
            state.center = Some(center);
            update.radius = state.radius;

            let evicted: Vec<PatchKey> = state
                .patches
                .keys()
                .copied()
                .filter(|key| !state.in_range(*key))
                .collect();
            for key in &evicted {
                state.patches.remove(key);
            }
            update.evicted = evicted;

            let missing: Vec<PatchKey> = center
                .square(update.radius)
                .into_iter()
                .filter(|key| !state.patches.contains_key(key) && !state.pending.contains(key))
                .collect();
            state.pending.extend(missing.iter().copied());
            missing
        };

        if !update.evicted.is_empty() {
            tracing::debug!("evicted {} patches around {}", update.evicted.len(), center);
        }
        if requested.is_empty() {
            update.refreshed = !update.evicted.is_empty();
            return update;
        }

        tracing::debug!("generating {} patches around {}", requested.len(), center);
        let guard = PendingGuard {
            cache: self,
            keys: requested.clone(),
        };

        let replies: Vec<_> = requested
            .iter()
            .map(|key| (*key, self.pool.submit(WorkerRequest::GeneratePatch(*key))))
            .collect();
        let mut results = Vec::with_capacity(replies.len());
        for (key, reply) in replies {
            results.push((key, reply.patch().await));
        }

        if self.signal.is_aborted() {
            tracing::debug!("session aborted, discarding {} patches", results.len());
            drop(guard);
            update.refreshed = !update.evicted.is_empty();
            return update;
        }

        {
            let mut state = self.state.lock();
            for (key, result) in results {
                match result {
                    Ok(patch) if state.in_range(key) => {
                        state.patches.insert(key, patch);
                        update.generated.push(key);
                    }
                    Ok(_) => tracing::trace!("patch {} left range while generating", key),
                    Err(e) => {
                        tracing::warn!("patch {} generation failed: {}", key, e);
                        update.failed.push(key);
                    }
                }
            }
        }
        drop(guard);

        update.refreshed = !update.generated.is_empty() || !update.evicted.is_empty();
        update
    }

    /// Returns a cached patch.
    #[must_use]
    pub fn get_patch(&self, key: PatchKey) -> Option<Arc<Patch>> {
        self.state.lock().patches.get(&key).cloned()
    }

    /// Top ground voxel of a column, if its patch is cached.
    #[must_use]
    pub fn get_column(&self, column: ColumnKey) -> Option<ColumnResult> {
        let key = column.patch(self.patch_size);
        self.state
            .lock()
            .patches
            .get(&key)
            .and_then(|patch| patch.column(column))
    }

    /// Returns true if the patch is cached.
    #[must_use]
    pub fn contains(&self, key: PatchKey) -> bool {
        self.state.lock().patches.contains_key(&key)
    }

    /// Number of cached patches.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.state.lock().patches.len()
    }

    /// Cached patch keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<PatchKey> {
        let mut keys: Vec<PatchKey> = self.state.lock().patches.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Drops a patch so the next coverage pass regenerates it.
    ///
    /// Returns true if the patch was cached.
    pub fn invalidate(&self, key: PatchKey) -> bool {
        let removed = self.state.lock().patches.remove(&key).is_some();
        if removed {
            tracing::debug!("patch {} invalidated", key);
        }
        removed
    }

    /// Current coverage radius.
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.state.lock().radius
    }

    /// Sets the radius, clamped to the power limit. Returns the new radius.
    pub fn set_radius(&self, radius: u32) -> u32 {
        let mut state = self.state.lock();
        state.radius = radius.min(self.power_limit);
        state.radius
    }

    /// Grows the radius, never shrinking it. Returns the new radius.
    pub fn grow_radius(&self, radius: u32) -> u32 {
        let mut state = self.state.lock();
        state.radius = state.radius.max(radius.min(self.power_limit));
        state.radius
    }

    /// Maximum radius.
    #[inline]
    #[must_use]
    pub const fn power_limit(&self) -> u32 {
        self.power_limit
    }

    /// Patch side length.
    #[inline]
    #[must_use]
    pub const fn patch_size(&self) -> u32 {
        self.patch_size
    }
}
