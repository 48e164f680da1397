//! Cache facade
//!
//! Routes every call to the typed store that owns the key and keeps the
//! keyspace directory in step with the stores. Writes that can create a key
//! hold the directory lock across the store call, so "does the key exist"
//! and "record its type" happen in one critical section. Reads, removals
//! and sweeps run under their store's lock alone and settle the directory
//! afterwards. Stores never call back into the directory, so the lock order
//! is always directory -> store.

mod directory;

pub use directory::Directory;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::store::{
    HashStore, KeyStore, KeyType, ListStore, SetStore, SortedSetStore, StoreStats, StringStore,
    Ttl, Value,
};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Embedded multi-type cache
pub struct Cache {
    directory: Mutex<Directory>,
    strings: StringStore,
    lists: ListStore,
    hashes: HashStore,
    sets: SetStore,
    zsets: SortedSetStore,
}

/// Statistics about the whole cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Keys in the directory, expired ones not yet reclaimed included
    pub tracked_keys: usize,
    pub stores: Vec<(KeyType, StoreStats)>,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Self {
        let capacity = config.initial_capacity;
        Cache {
            directory: Mutex::new(Directory::with_capacity(capacity)),
            strings: StringStore::with_capacity(capacity),
            lists: ListStore::with_capacity(capacity),
            hashes: HashStore::with_capacity(capacity),
            sets: SetStore::with_capacity(capacity),
            zsets: SortedSetStore::with_capacity(capacity),
        }
    }

    fn store(&self, kind: KeyType) -> &dyn KeyStore {
        match kind {
            KeyType::String => &self.strings,
            KeyType::List => &self.lists,
            KeyType::Hash => &self.hashes,
            KeyType::Set => &self.sets,
            KeyType::SortedSet => &self.zsets,
        }
    }

    // ======== directory plumbing ========

    /// Refuse to create `key` as `kind` while it is live in another store
    fn claim(&self, dir: &mut Directory, key: &[u8], kind: KeyType) -> CacheResult<()> {
        if let Some(found) = dir.type_of(key) {
            if found != kind {
                if self.store(found).exists(key) {
                    return Err(CacheError::WrongType { expected: kind, found });
                }
                debug!("Dropping expired {} key before reuse as {}", found, kind);
                dir.forget(key);
            }
        }
        Ok(())
    }

    /// Make the directory agree with the `kind` store about `key`
    fn settle(&self, dir: &mut Directory, key: &[u8], kind: KeyType) {
        if self.store(kind).exists(key) {
            if dir.type_of(key) != Some(kind) {
                dir.record(Bytes::copy_from_slice(key), kind);
            }
        } else {
            self.release(dir, key, kind);
        }
    }

    /// Forget `key` if it was tagged `kind` and that store no longer has it
    fn release(&self, dir: &mut Directory, key: &[u8], kind: KeyType) {
        if dir.type_of(key) == Some(kind) && !self.store(kind).exists(key) {
            dir.forget(key);
        }
    }

    /// Drop the tag of a key the `kind` store no longer holds
    ///
    /// Only takes the directory lock when the key is gone, so reads of live
    /// keys never contend with other stores.
    fn tidy(&self, key: &[u8], kind: KeyType) {
        if !self.store(kind).exists(key) {
            let mut dir = self.directory.lock();
            self.release(&mut dir, key, kind);
        }
    }

    /// Insert-or-update that reports whether the key existed
    fn upsert(
        &self,
        key: &Bytes,
        kind: KeyType,
        op: impl FnOnce() -> CacheResult<bool>,
    ) -> CacheResult<bool> {
        let mut dir = self.directory.lock();
        self.claim(&mut dir, key, kind)?;
        let existed = op()?;
        if !existed {
            dir.record(key.clone(), kind);
        }
        Ok(existed)
    }

    /// Write that may create the key without reporting it
    fn modify<R>(
        &self,
        key: &[u8],
        kind: KeyType,
        op: impl FnOnce() -> CacheResult<R>,
    ) -> CacheResult<R> {
        let mut dir = self.directory.lock();
        self.claim(&mut dir, key, kind)?;
        let out = op();
        self.settle(&mut dir, key, kind);
        out
    }

    /// Read or shrink an existing key
    ///
    /// Runs under the store's lock alone; the directory is only consulted
    /// afterwards if the key turned out to be gone.
    fn touch<R>(&self, key: &[u8], kind: KeyType, op: impl FnOnce() -> R) -> R {
        let out = op();
        self.tidy(key, kind);
        out
    }

    // ======== strings ========

    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Value>) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::String, || Ok(self.strings.set(key.clone(), value)))
    }

    pub fn set_ex(
        &self,
        key: impl Into<Bytes>,
        value: impl Into<Value>,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::String, || Ok(self.strings.set_ex(key.clone(), value, ttl)))
    }

    pub fn get(&self, key: &[u8]) -> CacheResult<Value> {
        self.touch(key, KeyType::String, || self.strings.get(key))
    }

    pub fn incr(&self, key: impl Into<Bytes>) -> CacheResult<i64> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: impl Into<Bytes>) -> CacheResult<i64> {
        self.decr_by(key, 1)
    }

    pub fn incr_by(&self, key: impl Into<Bytes>, delta: i64) -> CacheResult<i64> {
        let key = key.into();
        self.modify(&key, KeyType::String, || self.strings.incr_by(key.clone(), delta))
    }

    pub fn decr_by(&self, key: impl Into<Bytes>, delta: i64) -> CacheResult<i64> {
        let key = key.into();
        self.modify(&key, KeyType::String, || self.strings.decr_by(key.clone(), delta))
    }

    // ======== lists ========

    pub fn lpush(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::List, || Ok(self.lists.lpush(key.clone(), value)))
    }

    pub fn rpush(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::List, || Ok(self.lists.rpush(key.clone(), value)))
    }

    pub fn lpop(&self, key: &[u8]) -> CacheResult<Bytes> {
        self.touch(key, KeyType::List, || self.lists.lpop(key))
    }

    pub fn rpop(&self, key: &[u8]) -> CacheResult<Bytes> {
        self.touch(key, KeyType::List, || self.lists.rpop(key))
    }

    pub fn llen(&self, key: &[u8]) -> usize {
        self.touch(key, KeyType::List, || self.lists.llen(key))
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Bytes>> {
        self.touch(key, KeyType::List, || self.lists.lrange(key, start, stop))
    }

    // ======== hashes ========

    pub fn hset(
        &self,
        key: impl Into<Bytes>,
        field: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::Hash, || Ok(self.hashes.hset(key.clone(), field, value)))
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> CacheResult<Bytes> {
        self.touch(key, KeyType::Hash, || self.hashes.hget(key, field))
    }

    pub fn hdel(&self, key: &[u8], field: &[u8]) -> bool {
        self.touch(key, KeyType::Hash, || self.hashes.hdel(key, field))
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        self.touch(key, KeyType::Hash, || self.hashes.hexists(key, field))
    }

    pub fn hlen(&self, key: &[u8]) -> usize {
        self.touch(key, KeyType::Hash, || self.hashes.hlen(key))
    }

    pub fn hkeys(&self, key: &[u8]) -> CacheResult<Vec<Bytes>> {
        self.touch(key, KeyType::Hash, || self.hashes.hkeys(key))
    }

    pub fn hvals(&self, key: &[u8]) -> CacheResult<Vec<Bytes>> {
        self.touch(key, KeyType::Hash, || self.hashes.hvals(key))
    }

    pub fn hgetall(&self, key: &[u8]) -> CacheResult<HashMap<Bytes, Bytes>> {
        self.touch(key, KeyType::Hash, || self.hashes.hgetall(key))
    }

    // ======== sets ========

    pub fn sadd(&self, key: impl Into<Bytes>, member: impl Into<Bytes>) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::Set, || Ok(self.sets.sadd(key.clone(), member)))
    }

    pub fn srem(&self, key: &[u8], member: &[u8]) -> bool {
        self.touch(key, KeyType::Set, || self.sets.srem(key, member))
    }

    pub fn smembers(&self, key: &[u8]) -> CacheResult<Vec<Bytes>> {
        self.touch(key, KeyType::Set, || self.sets.smembers(key))
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> CacheResult<bool> {
        self.touch(key, KeyType::Set, || self.sets.sismember(key, member))
    }

    pub fn scard(&self, key: &[u8]) -> usize {
        self.touch(key, KeyType::Set, || self.sets.scard(key))
    }

    pub fn sunion(&self, first: &[u8], second: &[u8]) -> HashSet<Bytes> {
        let out = self.sets.sunion(first, second);
        self.tidy(first, KeyType::Set);
        self.tidy(second, KeyType::Set);
        out
    }

    pub fn sinter(&self, first: &[u8], second: &[u8]) -> HashSet<Bytes> {
        let out = self.sets.sinter(first, second);
        self.tidy(first, KeyType::Set);
        self.tidy(second, KeyType::Set);
        out
    }

    // ======== sorted sets ========

    pub fn zadd(
        &self,
        key: impl Into<Bytes>,
        member: impl Into<Bytes>,
        score: f64,
    ) -> CacheResult<bool> {
        let key = key.into();
        self.upsert(&key, KeyType::SortedSet, || self.zsets.zadd(key.clone(), member, score))
    }

    pub fn zrem(&self, key: &[u8], member: &[u8]) -> bool {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrem(key, member))
    }

    pub fn zincr_by(
        &self,
        key: impl Into<Bytes>,
        member: impl Into<Bytes>,
        delta: f64,
    ) -> CacheResult<f64> {
        let key = key.into();
        self.modify(&key, KeyType::SortedSet, || self.zsets.zincr_by(key.clone(), member, delta))
    }

    pub fn zdecr_by(
        &self,
        key: impl Into<Bytes>,
        member: impl Into<Bytes>,
        delta: f64,
    ) -> CacheResult<f64> {
        let key = key.into();
        self.modify(&key, KeyType::SortedSet, || self.zsets.zdecr_by(key.clone(), member, delta))
    }

    pub fn zcard(&self, key: &[u8]) -> usize {
        self.touch(key, KeyType::SortedSet, || self.zsets.zcard(key))
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zscore(key, member))
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrank(key, member))
    }

    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrevrank(key, member))
    }

    pub fn zrank_with_score(&self, key: &[u8], member: &[u8]) -> Option<(usize, f64)> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrank_with_score(key, member))
    }

    pub fn zrevrank_with_score(&self, key: &[u8], member: &[u8]) -> Option<(usize, f64)> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrevrank_with_score(key, member))
    }

    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Bytes>> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrange(key, start, stop))
    }

    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Bytes>> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrevrange(key, start, stop))
    }

    pub fn zrange_with_score(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> CacheResult<HashMap<Bytes, f64>> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrange_with_score(key, start, stop))
    }

    pub fn zrevrange_with_score(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
    ) -> CacheResult<HashMap<Bytes, f64>> {
        self.touch(key, KeyType::SortedSet, || self.zsets.zrevrange_with_score(key, start, stop))
    }

    // ======== global ========

    /// True iff the key is live in some store
    pub fn exists(&self, key: &[u8]) -> bool {
        self.type_of(key).is_some()
    }

    /// Type of the live key, if any
    pub fn type_of(&self, key: &[u8]) -> Option<KeyType> {
        let mut dir = self.directory.lock();
        let kind = dir.type_of(key)?;
        if self.store(kind).exists(key) {
            Some(kind)
        } else {
            dir.forget(key);
            None
        }
    }

    /// Delete the key from whichever store owns it, no-op if absent
    pub fn del(&self, key: &[u8]) -> bool {
        let mut dir = self.directory.lock();
        match dir.forget(key) {
            Some(kind) => self.store(kind).remove(key),
            None => false,
        }
    }

    /// Expire the key `ttl` from now
    pub fn expiration(&self, key: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut dir = self.directory.lock();
        let kind = dir.type_of(key).ok_or(CacheError::KeyNotFound)?;
        let result = self.store(kind).expire(key, ttl);
        if result.is_err() {
            dir.forget(key);
        }
        result
    }

    /// Drop the key's expiration, returns false if absent
    pub fn persist(&self, key: &[u8]) -> bool {
        let mut dir = self.directory.lock();
        let kind = match dir.type_of(key) {
            Some(kind) => kind,
            None => return false,
        };
        let persisted = self.store(kind).persist(key);
        if !persisted {
            dir.forget(key);
        }
        persisted
    }

    pub fn ttl(&self, key: &[u8]) -> Ttl {
        let mut dir = self.directory.lock();
        let kind = match dir.type_of(key) {
            Some(kind) => kind,
            None => return Ttl::Missing,
        };
        let ttl = self.store(kind).ttl(key);
        if ttl == Ttl::Missing {
            dir.forget(key);
        }
        ttl
    }

    /// Remove every key from every store
    pub fn flush(&self) {
        let mut dir = self.directory.lock();
        for kind in KeyType::ALL {
            self.store(kind).flush();
        }
        dir.clear();
        debug!("Cache flushed");
    }

    /// Number of tracked keys, expired ones not yet reclaimed included
    pub fn len(&self) -> usize {
        self.directory.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tracked_keys: self.len(),
            stores: KeyType::ALL
                .iter()
                .map(|kind| (*kind, self.store(*kind).stats()))
                .collect(),
        }
    }

    // ======== expiration ========

    /// Remove up to `limit` expired entries from one store
    ///
    /// The store is swept under its own lock; the directory lock is taken
    /// only afterwards, to drop the tags of the reclaimed keys.
    pub fn sweep(&self, kind: KeyType, limit: usize) -> usize {
        let removed = self.store(kind).sweep(limit);
        if !removed.is_empty() {
            let mut dir = self.directory.lock();
            for key in &removed {
                self.release(&mut dir, key, kind);
            }
        }
        removed.len()
    }

    /// Sweep one store picked uniformly at random
    pub fn sweep_random(&self, limit: usize) -> (KeyType, usize) {
        let kind = KeyType::ALL[rand::thread_rng().gen_range(0..KeyType::ALL.len())];
        (kind, self.sweep(kind, limit))
    }

    /// Remove every expired entry from every store
    pub fn clear_expired(&self) -> usize {
        KeyType::ALL
            .iter()
            .map(|kind| self.sweep(*kind, usize::MAX))
            .sum()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
