use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;

/// DashMap with FxHasher for fast concurrent access
type FastDashMap<K, V> = DashMap<K, V, FxBuildHasher>;

/// In-memory trunk store: the authoritative key-value base store backing
/// the world state.
///
/// Reads are lock-free and may run concurrently from any thread. All
/// mutations go through [`TrunkStore::update`], whose closures run under a
/// single mutex so each update section is the unit of atomicity.
pub struct TrunkStore {
    entries: FastDashMap<Vec<u8>, Vec<u8>>,
    update_lock: Mutex<()>,
}

impl TrunkStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
            update_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Warm-up hint: the key will be written by an upcoming update section.
    /// The in-memory store keeps everything resident, so this is a no-op,
    /// but callers issue it wherever a disk-backed store would prefetch.
    pub fn prepare_for_update(&self, _key: &[u8]) {}

    /// Warm-up hint for an upcoming deletion.
    pub fn prepare_for_deletion(&self, _key: &[u8]) {}

    /// Run a serialized update section. Concurrent callers are queued; the
    /// closure's writes become visible as a unit relative to other updates.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut TrunkBatch<'_>),
    {
        let _guard = self.update_lock.lock();
        let mut batch = TrunkBatch { store: self };
        f(&mut batch);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Sorted copy of every entry, for diffing whole-store state.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl Default for TrunkStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Write handle passed to [`TrunkStore::update`] closures.
pub struct TrunkBatch<'a> {
    store: &'a TrunkStore,
}

impl TrunkBatch<'_> {
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.store.entries.insert(key.to_vec(), value.to_vec());
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.store.entries.remove(key);
    }
}
