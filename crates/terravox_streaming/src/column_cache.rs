//! # Compressed Chunk Column Cache
//!
//! Holds the last compressed column received for each chunk column so the
//! coordinator never re-requests a column it has already seen.
//!
//! Bounded two ways: a hard LRU capacity, and [`CompressedColumnCache::retain_near`]
//! which drops columns far from the player whenever the player moves.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use terravox_shared::PatchKey;

/// Bounded cache of compressed chunk columns keyed by column (`x:z`).
pub struct CompressedColumnCache {
    entries: LruCache<PatchKey, Arc<[u8]>>,
}

impl CompressedColumnCache {
    /// Creates a cache holding at most `capacity` columns (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Stores a column, replacing any previous payload.
    ///
    /// Returns the key evicted to make room, if any.
    pub fn insert(&mut self, key: PatchKey, bytes: impl Into<Arc<[u8]>>) -> Option<PatchKey> {
        match self.entries.push(key, bytes.into()) {
            Some((evicted, _)) if evicted != key => {
                tracing::debug!("column cache full, evicted {}", evicted);
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Returns the payload of a column and marks it recently used.
    pub fn get(&mut self, key: PatchKey) -> Option<Arc<[u8]>> {
        self.entries.get(&key).cloned()
    }

    /// Returns true if the column is cached.
    #[must_use]
    pub fn contains(&self, key: PatchKey) -> bool {
        self.entries.contains(&key)
    }

    /// Drops a column so it will be requested again.
    pub fn remove(&mut self, key: PatchKey) -> bool {
        self.entries.pop(&key).is_some()
    }

    /// Keys from `keys` that are not cached, in order.
    #[must_use]
    pub fn missing(&self, keys: &[PatchKey]) -> Vec<PatchKey> {
        keys.iter().copied().filter(|key| !self.contains(*key)).collect()
    }

    /// Drops every column farther than `distance` rings from `center`.
    ///
    /// Returns the number of columns dropped.
    pub fn retain_near(&mut self, center: PatchKey, distance: u32) -> usize {
        let far: Vec<PatchKey> = self
            .entries
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| key.ring_distance(center) > distance)
            .collect();
        for key in &far {
            self.entries.pop(key);
        }
        far.len()
    }

    /// Number of cached columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of columns.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(tag: u8) -> Vec<u8> {
        vec![tag; 4]
    }

    #[test]
    fn test_lru_capacity_is_enforced() {
        let mut cache = CompressedColumnCache::new(2);
        assert_eq!(cache.insert(PatchKey::new(0, 0), bytes(1)), None);
        assert_eq!(cache.insert(PatchKey::new(1, 0), bytes(2)), None);

        // touch (0,0) so (1,0) is the eviction candidate
        assert!(cache.get(PatchKey::new(0, 0)).is_some());
        assert_eq!(cache.insert(PatchKey::new(2, 0), bytes(3)), Some(PatchKey::new(1, 0)));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(PatchKey::new(1, 0)));
    }

    #[test]
    fn test_reinsert_replaces_without_eviction() {
        let mut cache = CompressedColumnCache::new(1);
        cache.insert(PatchKey::new(0, 0), bytes(1));
        assert_eq!(cache.insert(PatchKey::new(0, 0), bytes(2)), None);
        assert_eq!(&*cache.get(PatchKey::new(0, 0)).unwrap(), &bytes(2)[..]);
    }

    #[test]
    fn test_retain_near_drops_distant_columns() {
        let mut cache = CompressedColumnCache::new(64);
        for x in -4..=4 {
            cache.insert(PatchKey::new(x, 0), bytes(0));
        }

        let dropped = cache.retain_near(PatchKey::new(0, 0), 2);
        assert_eq!(dropped, 4);
        assert_eq!(cache.len(), 5);
        assert!(cache.contains(PatchKey::new(-2, 0)));
        assert!(!cache.contains(PatchKey::new(3, 0)));
    }

    #[test]
    fn test_missing_preserves_order() {
        let mut cache = CompressedColumnCache::new(8);
        cache.insert(PatchKey::new(1, 1), bytes(0));
        let wanted = [PatchKey::new(0, 0), PatchKey::new(1, 1), PatchKey::new(2, 2)];
        assert_eq!(cache.missing(&wanted), vec![PatchKey::new(0, 0), PatchKey::new(2, 2)]);
        assert_eq!(CompressedColumnCache::new(0).capacity(), 1);
    }
}
