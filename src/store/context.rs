use super::trunk::TrunkStore;
use crate::types::{AccountInfo, Address};
use alloy_primitives::keccak256;
use log::warn;
use rustc_hash::FxHashMap;
use std::sync::Arc;

const ACCOUNT_KEY_PREFIX: u8 = b'a';

/// Store key for an account record.
pub fn account_key(addr: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + Address::LEN);
    key.push(ACCOUNT_KEY_PREFIX);
    key.extend_from_slice(&addr.0);
    key
}

/// 64-bit fingerprint of a store key, used for conflict detection. A hash
/// collision can only produce a false conflict, which costs one retry.
pub fn short_key(key: &[u8]) -> u64 {
    let digest = keccak256(key);
    u64::from_le_bytes(digest[..8].try_into().expect("8-byte slice"))
}

struct CacheEntry {
    value: Option<Vec<u8>>,
    dirty: bool,
}

/// Copy-on-write view over the trunk store.
///
/// Records every key it touches: clean entries for read-through loads,
/// dirty entries for buffered writes and deletions. Nothing reaches the
/// trunk until [`Context::close`] with `write_back = true`, which applies
/// all dirty entries in one serialized update section.
pub struct Context {
    trunk: Arc<TrunkStore>,
    cache: FxHashMap<Vec<u8>, CacheEntry>,
}

impl Context {
    pub fn new(trunk: Arc<TrunkStore>) -> Self {
        Self {
            trunk,
            cache: FxHashMap::default(),
        }
    }

    /// A fresh copy-on-write view over the same trunk.
    pub fn with_copy(&self) -> Context {
        Context::new(Arc::clone(&self.trunk))
    }

    pub fn trunk(&self) -> &Arc<TrunkStore> {
        &self.trunk
    }

    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(entry) = self.cache.get(key) {
            return entry.value.clone();
        }
        let value = self.trunk.get(key);
        self.cache.insert(
            key.to_vec(),
            CacheEntry {
                value: value.clone(),
                dirty: false,
            },
        );
        value
    }

    pub fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.cache.insert(
            key.to_vec(),
            CacheEntry {
                value: Some(value),
                dirty: true,
            },
        );
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.cache.insert(
            key.to_vec(),
            CacheEntry {
                value: None,
                dirty: true,
            },
        );
    }

    pub fn get_account(&mut self, addr: &Address) -> Option<AccountInfo> {
        let bytes = self.get(&account_key(addr))?;
        match AccountInfo::from_bytes(&bytes) {
            Ok(acc) => Some(acc),
            Err(e) => {
                warn!("corrupt account record for {}: {}", addr, e);
                None
            }
        }
    }

    pub fn set_account(&mut self, addr: &Address, account: &AccountInfo) {
        self.set(&account_key(addr), account.to_bytes());
    }

    /// Visit the 64-bit fingerprint and dirty flag of every cached entry.
    /// The callback returns `true` to stop the scan early.
    pub fn scan_short_keys<F>(&self, mut f: F)
    where
        F: FnMut(u64, bool) -> bool,
    {
        for (key, entry) in &self.cache {
            if f(short_key(key), entry.dirty) {
                return;
            }
        }
    }

    pub fn cached_entry_count(&self) -> usize {
        self.cache.len()
    }

    /// Whether any entry was written or deleted through this view.
    pub fn has_dirty_entries(&self) -> bool {
        self.cache.values().any(|e| e.dirty)
    }

    /// Close the view. With `write_back`, all dirty entries are applied to
    /// the trunk atomically; otherwise the view is simply discarded.
    pub fn close(self, write_back: bool) {
        if !write_back {
            return;
        }
        let dirty: Vec<_> = self
            .cache
            .into_iter()
            .filter(|(_, e)| e.dirty)
            .collect();
        if dirty.is_empty() {
            return;
        }
        self.trunk.update(|batch| {
            for (key, entry) in &dirty {
                match &entry.value {
                    Some(value) => batch.set(key, value),
                    None => batch.delete(key),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn fresh_trunk() -> Arc<TrunkStore> {
        Arc::new(TrunkStore::new())
    }

    #[test]
    fn test_write_back_applies_dirty_entries() {
        let trunk = fresh_trunk();
        let mut ctx = Context::new(Arc::clone(&trunk));
        ctx.set(b"k", b"v".to_vec());
        assert_eq!(ctx.get(b"k"), Some(b"v".to_vec()));
        assert_eq!(trunk.get(b"k"), None);

        ctx.close(true);
        assert_eq!(trunk.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn test_discard_leaves_trunk_untouched() {
        let trunk = fresh_trunk();
        let mut ctx = Context::new(Arc::clone(&trunk));
        ctx.set(b"k", b"v".to_vec());
        ctx.close(false);
        assert_eq!(trunk.get(b"k"), None);
    }

    #[test]
    fn test_clean_reads_are_recorded_but_not_written() {
        let trunk = fresh_trunk();
        trunk.update(|b| b.set(b"k", b"v"));

        let mut ctx = Context::new(Arc::clone(&trunk));
        assert_eq!(ctx.get(b"k"), Some(b"v".to_vec()));
        assert_eq!(ctx.cached_entry_count(), 1);
        assert!(!ctx.has_dirty_entries());

        let mut clean = 0;
        let mut dirty = 0;
        ctx.scan_short_keys(|_, is_dirty| {
            if is_dirty {
                dirty += 1;
            } else {
                clean += 1;
            }
            false
        });
        assert_eq!((clean, dirty), (1, 0));
    }

    #[test]
    fn test_account_roundtrip_through_context() {
        let trunk = fresh_trunk();
        let addr = Address::new([3u8; 20]);
        let mut ctx = Context::new(Arc::clone(&trunk));
        assert!(ctx.get_account(&addr).is_none());

        ctx.set_account(&addr, &AccountInfo::new(5, U256::from(777u64)));
        ctx.close(true);

        let mut ctx = Context::new(trunk);
        let acc = ctx.get_account(&addr).unwrap();
        assert_eq!(acc.nonce(), 5);
        assert_eq!(acc.balance(), U256::from(777u64));
    }

    #[test]
    fn test_short_key_is_stable() {
        assert_eq!(short_key(b"some-key"), short_key(b"some-key"));
        assert_ne!(short_key(b"some-key"), short_key(b"other-key"));
    }
}
