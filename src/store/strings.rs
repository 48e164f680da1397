//! String store: scalar payloads and counters

use super::shared::{SharedMap, TypedStore};
use super::{KeyType, Value};
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use std::time::Duration;

/// key -> `Value`
pub struct StringStore {
    items: SharedMap<Value>,
}

impl StringStore {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        StringStore {
            items: SharedMap::with_capacity(capacity),
        }
    }

    /// Store `value` with no expiration, returns true if the key existed
    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Value>) -> bool {
        self.items.write().insert(key.into(), value.into(), None)
    }

    /// Store `value` expiring `ttl` from now, returns true if the key existed
    pub fn set_ex(&self, key: impl Into<Bytes>, value: impl Into<Value>, ttl: Duration) -> bool {
        self.items.write().insert(key.into(), value.into(), Some(ttl))
    }

    pub fn get(&self, key: &[u8]) -> CacheResult<Value> {
        self.items
            .read_live(key, Value::clone)
            .ok_or(CacheError::KeyNotFound)
    }

    pub fn incr(&self, key: impl Into<Bytes>) -> CacheResult<i64> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: impl Into<Bytes>) -> CacheResult<i64> {
        self.decr_by(key, 1)
    }

    pub fn incr_by(&self, key: impl Into<Bytes>, delta: i64) -> CacheResult<i64> {
        self.apply(key.into(), |n| n.checked_add(delta))
    }

    pub fn decr_by(&self, key: impl Into<Bytes>, delta: i64) -> CacheResult<i64> {
        self.apply(key.into(), |n| n.checked_sub(delta))
    }

    /// Counter update; an absent or expired key starts from 0
    ///
    /// A live counter keeps its expiration. Nothing is written when the
    /// update fails.
    fn apply(&self, key: Bytes, op: impl FnOnce(i64) -> Option<i64>) -> CacheResult<i64> {
        let mut items = self.items.write();
        match items.get_mut(&key) {
            Some(Value::Integer(n)) => {
                let next = op(*n).ok_or(CacheError::Overflow)?;
                *n = next;
                Ok(next)
            }
            Some(Value::Bytes(_)) => Err(CacheError::TypeMismatch),
            None => {
                let next = op(0).ok_or(CacheError::Overflow)?;
                items.insert(key, Value::Integer(next), None);
                Ok(next)
            }
        }
    }
}

impl Default for StringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedStore for StringStore {
    type Value = Value;
    const KIND: KeyType = KeyType::String;

    fn shared(&self) -> &SharedMap<Value> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyStore, Ttl};
    use std::sync::Arc;
    use std::thread::sleep;

    #[test]
    fn test_set_get() {
        let store = StringStore::new();
        assert!(!store.set("name", "zhangSan"));
        assert_eq!(store.get(b"name"), Ok(Value::from("zhangSan")));
        assert!(store.set("name", "lisi"));
        assert_eq!(store.get(b"name"), Ok(Value::from("lisi")));
        assert_eq!(store.get(b"other"), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn test_set_ex_expires() {
        let store = StringStore::new();
        store.set_ex("exp", "hello", Duration::from_micros(500));
        sleep(Duration::from_millis(10));
        assert_eq!(store.get(b"exp"), Err(CacheError::KeyNotFound));
        assert!(!store.exists(b"exp"));
        assert_eq!(store.stats().total_keys, 0);
    }

    #[test]
    fn test_set_clears_ttl() {
        let store = StringStore::new();
        store.set_ex("k", "v", Duration::from_secs(60));
        store.set("k", "w");
        assert_eq!(store.ttl(b"k"), Ttl::Forever);
    }

    #[test]
    fn test_incr_decr() {
        let store = StringStore::new();
        assert_eq!(store.incr("count"), Ok(1));
        assert_eq!(store.decr("count"), Ok(0));
        assert_eq!(store.get(b"count"), Ok(Value::Integer(0)));
    }

    #[test]
    fn test_incrby_decrby() {
        let store = StringStore::new();
        assert_eq!(store.incr_by("count", 100), Ok(100));
        assert_eq!(store.decr_by("count", 50), Ok(50));
        assert_eq!(store.decr("fresh"), Ok(-1));
    }

    #[test]
    fn test_incr_rejects_payload() {
        let store = StringStore::new();
        store.set("name", "42");
        assert_eq!(store.incr("name"), Err(CacheError::TypeMismatch));
        assert_eq!(store.get(b"name"), Ok(Value::from("42")));
    }

    #[test]
    fn test_incr_overflow_leaves_value() {
        let store = StringStore::new();
        store.set("max", i64::MAX);
        assert_eq!(store.incr("max"), Err(CacheError::Overflow));
        assert_eq!(store.get(b"max"), Ok(Value::Integer(i64::MAX)));

        assert_eq!(store.decr_by("min", i64::MIN), Err(CacheError::Overflow));
        assert!(!store.exists(b"min"));
    }

    #[test]
    fn test_incr_after_expiry_restarts() {
        let store = StringStore::new();
        store.set_ex("count", 41i64, Duration::from_millis(1));
        sleep(Duration::from_millis(10));
        assert_eq!(store.incr("count"), Ok(1));
        assert_eq!(store.ttl(b"count"), Ttl::Forever);
    }

    #[test]
    fn test_incr_keeps_ttl() {
        let store = StringStore::new();
        store.set_ex("count", 1i64, Duration::from_secs(60));
        assert_eq!(store.incr("count"), Ok(2));
        assert!(matches!(store.ttl(b"count"), Ttl::Remaining(_)));
    }

    #[test]
    fn test_expire_missing_key() {
        let store = StringStore::new();
        assert_eq!(
            store.expire(b"nope", Duration::from_secs(1)),
            Err(CacheError::KeyNotFound)
        );
    }

    #[test]
    fn test_concurrent_incr() {
        let store = Arc::new(StringStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.incr("hits").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get(b"hits"), Ok(Value::Integer(8000)));
    }
}
