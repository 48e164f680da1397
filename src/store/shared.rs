//! Locked map shared by the typed stores, and the traits they expose

use super::memory::{ExpiringMap, Peek, StoreStats, Ttl};
use super::KeyType;
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// One coarse lock around a store's whole map
///
/// Critical sections are short: acquire, read or mutate, release. Reads
/// take the shared side and only escalate to the exclusive side to purge
/// an entry they found expired.
pub struct SharedMap<V> {
    inner: RwLock<ExpiringMap<V>>,
}

impl<V> SharedMap<V> {
    /// Create a map with the given initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        SharedMap {
            inner: RwLock::new(ExpiringMap::with_capacity(capacity)),
        }
    }

    /// Exclusive access for mutations
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, ExpiringMap<V>> {
        self.inner.write()
    }

    /// Shared access for multi-key reads
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ExpiringMap<V>> {
        self.inner.read()
    }

    /// Run `f` against the live value for `key`
    ///
    /// Returns `None` if the key is absent or expired; an expired entry is
    /// deleted before returning.
    pub(crate) fn read_live<R>(&self, key: &[u8], f: impl FnOnce(&V) -> R) -> Option<R> {
        {
            let map = self.inner.read();
            match map.peek(key) {
                Peek::Live(value) => return Some(f(value)),
                Peek::Missing => return None,
                Peek::Expired => {}
            }
        }
        self.inner.write().remove_if_expired(key);
        None
    }
}

impl<V> Default for SharedMap<V> {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

/// Implemented by each typed store to hand its map to the shared
/// key-level operations
pub trait TypedStore: Send + Sync {
    type Value: Send + Sync;

    /// Tag recorded in the keyspace directory for this store's keys
    const KIND: KeyType;

    fn shared(&self) -> &SharedMap<Self::Value>;
}

/// Key-level operations every typed store supports
///
/// Object safe so the cache can route by `KeyType` without knowing the
/// concrete store.
pub trait KeyStore: Send + Sync {
    /// Which type this store holds
    fn kind(&self) -> KeyType;

    /// True iff the key is present and not expired
    fn exists(&self, key: &[u8]) -> bool;

    /// Delete the key, returns true if a live value was removed
    fn remove(&self, key: &[u8]) -> bool;

    /// Expire the key `ttl` from now
    fn expire(&self, key: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Drop the key's expiration, returns false if absent
    fn persist(&self, key: &[u8]) -> bool;

    /// Remaining lifetime of the key
    fn ttl(&self, key: &[u8]) -> Ttl;

    /// Remove up to `limit` expired entries, returns their keys
    fn sweep(&self, limit: usize) -> Vec<Bytes>;

    /// Remove every expired entry, returns their keys
    fn clear_expired(&self) -> Vec<Bytes>;

    /// Remove everything
    fn flush(&self);

    fn stats(&self) -> StoreStats;
}

impl<T: TypedStore> KeyStore for T {
    fn kind(&self) -> KeyType {
        T::KIND
    }

    fn exists(&self, key: &[u8]) -> bool {
        self.shared().read_live(key, |_| ()).is_some()
    }

    fn remove(&self, key: &[u8]) -> bool {
        self.shared().write().remove(key)
    }

    fn expire(&self, key: &[u8], ttl: Duration) -> CacheResult<()> {
        if self.shared().write().expire(key, ttl) {
            Ok(())
        } else {
            Err(CacheError::KeyNotFound)
        }
    }

    fn persist(&self, key: &[u8]) -> bool {
        self.shared().write().persist(key)
    }

    fn ttl(&self, key: &[u8]) -> Ttl {
        self.shared().write().ttl(key)
    }

    fn sweep(&self, limit: usize) -> Vec<Bytes> {
        self.shared().write().sweep(limit)
    }

    fn clear_expired(&self) -> Vec<Bytes> {
        self.shared().write().clear_expired()
    }

    fn flush(&self) {
        self.shared().write().clear();
    }

    fn stats(&self) -> StoreStats {
        self.shared().read().stats()
    }
}
