// ahal-usb/src/cache.rs
//
// Parsed capability stores keyed by hardware address

use std::collections::HashMap;
use std::sync::Arc;

use ahal_core::DeviceAddress;
use parking_lot::RwLock;
use tracing::debug;

use crate::store::CapabilityStore;

/// Address -> parsed capability store
///
/// Re-enumeration of the same hardware at the same address hits the cache
/// instead of re-parsing; disconnect invalidates the entry.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    stores: RwLock<HashMap<DeviceAddress, Arc<CapabilityStore>>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached store for `address`
    pub fn lookup(&self, address: &DeviceAddress) -> Option<Arc<CapabilityStore>> {
        self.stores.read().get(address).cloned()
    }

    /// True when a parsed store exists for `address`
    pub fn is_config_cached(&self, address: &DeviceAddress) -> bool {
        self.stores
            .read()
            .get(address)
            .is_some_and(|store| store.is_config_cached(address))
    }

    /// Cache a store under its own address, replacing any previous entry
    pub fn insert(&self, store: CapabilityStore) -> Arc<CapabilityStore> {
        let store = Arc::new(store);
        debug!("Caching capabilities for {}", store.address());
        self.stores
            .write()
            .insert(store.address().clone(), Arc::clone(&store));
        store
    }

    /// Drop the entry for `address`. Returns true if one existed.
    pub fn invalidate(&self, address: &DeviceAddress) -> bool {
        let removed = self.stores.write().remove(address).is_some();
        if removed {
            debug!("Invalidated capabilities for {}", address);
        }
        removed
    }

    pub fn clear(&self) {
        self.stores.write().clear();
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahal_core::Direction;

    fn parsed_store(card: u32) -> CapabilityStore {
        let mut store = CapabilityStore::new(DeviceAddress::new(card, 0));
        store
            .load_capability(
                Direction::Playback,
                "Playback:\n  Format: S16_LE\n  Channels: 2\n  Rates: 48000\n",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_insert_and_lookup() {
        let cache = CapabilityCache::new();
        assert!(cache.is_empty());

        cache.insert(parsed_store(1));
        let address = DeviceAddress::new(1, 0);

        assert!(cache.is_config_cached(&address));
        assert!(cache.lookup(&address).is_some());
        assert!(!cache.is_config_cached(&DeviceAddress::new(2, 0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_store_is_not_cached_config() {
        let cache = CapabilityCache::new();
        cache.insert(CapabilityStore::new(DeviceAddress::new(4, 0)));
        assert!(!cache.is_config_cached(&DeviceAddress::new(4, 0)));
    }

    #[test]
    fn test_invalidate() {
        let cache = CapabilityCache::new();
        cache.insert(parsed_store(1));
        cache.insert(parsed_store(2));

        assert!(cache.invalidate(&DeviceAddress::new(1, 0)));
        assert!(!cache.invalidate(&DeviceAddress::new(1, 0)));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
