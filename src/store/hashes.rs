//! Hash store: field -> value maps

use super::shared::{SharedMap, TypedStore};
use super::KeyType;
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use std::collections::HashMap;

/// key -> (field -> value)
pub struct HashStore {
    items: SharedMap<HashMap<Bytes, Bytes>>,
}

impl HashStore {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        HashStore {
            items: SharedMap::with_capacity(capacity),
        }
    }

    /// Upsert a field, creating the hash if absent
    ///
    /// Returns true if the hash key (not the field) already existed.
    pub fn hset(
        &self,
        key: impl Into<Bytes>,
        field: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> bool {
        let mut items = self.items.write();
        let (hash, existed) = items.get_or_insert_with(key.into(), HashMap::new);
        hash.insert(field.into(), value.into());
        existed
    }

    /// Get a field's value
    ///
    /// `KeyNotFound` if the hash is absent, `FieldNotFound` if only the
    /// field is.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> CacheResult<Bytes> {
        self.items
            .read_live(key, |hash| hash.get(field).cloned().ok_or(CacheError::FieldNotFound))
            .unwrap_or(Err(CacheError::KeyNotFound))
    }

    /// Delete a field, returns true if it was present
    pub fn hdel(&self, key: &[u8], field: &[u8]) -> bool {
        self.items
            .write()
            .get_mut(key)
            .map(|hash| hash.remove(field).is_some())
            .unwrap_or(false)
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        self.items
            .read_live(key, |hash| hash.contains_key(field))
            .unwrap_or(false)
    }

    /// Number of fields, 0 if absent
    pub fn hlen(&self, key: &[u8]) -> usize {
        self.items.read_live(key, HashMap::len).unwrap_or(0)
    }

    /// All field names, in no particular order
    pub fn hkeys(&self, key: &[u8]) -> CacheResult<Vec<Bytes>> {
        self.items
            .read_live(key, |hash| hash.keys().cloned().collect())
            .ok_or(CacheError::KeyNotFound)
    }

    /// All values, in no particular order
    pub fn hvals(&self, key: &[u8]) -> CacheResult<Vec<Bytes>> {
        self.items
            .read_live(key, |hash| hash.values().cloned().collect())
            .ok_or(CacheError::KeyNotFound)
    }

    /// Copy of the whole hash
    pub fn hgetall(&self, key: &[u8]) -> CacheResult<HashMap<Bytes, Bytes>> {
        self.items
            .read_live(key, HashMap::clone)
            .ok_or(CacheError::KeyNotFound)
    }
}

impl Default for HashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedStore for HashStore {
    type Value = HashMap<Bytes, Bytes>;
    const KIND: KeyType = KeyType::Hash;

    fn shared(&self) -> &SharedMap<HashMap<Bytes, Bytes>> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KeyStore;
    use std::time::Duration;

    fn person() -> HashStore {
        let store = HashStore::new();
        store.hset("hKey", "name", "zhangSan");
        store.hset("hKey", "age", "18");
        store
    }

    #[test]
    fn test_hset_reports_outer_key() {
        let store = HashStore::new();
        assert!(!store.hset("hKey", "name", "a"));
        assert!(store.hset("hKey", "name", "b"));
        assert!(store.hset("hKey", "age", "18"));
        assert_eq!(store.hget(b"hKey", b"name"), Ok(Bytes::from("b")));
    }

    #[test]
    fn test_hget_errors() {
        let store = person();
        assert_eq!(store.hget(b"hKey", b"age"), Ok(Bytes::from("18")));
        assert_eq!(store.hget(b"hKey", b"email"), Err(CacheError::FieldNotFound));
        assert_eq!(store.hget(b"nope", b"age"), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn test_hkeys_hvals_hdel() {
        let store = person();
        let mut keys = store.hkeys(b"hKey").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["age", "name"]);

        let mut vals = store.hvals(b"hKey").unwrap();
        vals.sort();
        assert_eq!(vals, vec!["18", "zhangSan"]);

        assert!(store.hdel(b"hKey", b"age"));
        assert!(!store.hdel(b"hKey", b"age"));
        assert!(!store.hdel(b"nope", b"age"));
        assert_eq!(store.hkeys(b"hKey").unwrap(), vec!["name"]);
        assert_eq!(store.hkeys(b"nope"), Err(CacheError::KeyNotFound));
        assert_eq!(store.hvals(b"nope"), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn test_hexists_hlen_hgetall() {
        let store = person();
        assert!(store.hexists(b"hKey", b"name"));
        assert!(!store.hexists(b"hKey", b"email"));
        assert_eq!(store.hlen(b"hKey"), 2);
        assert_eq!(store.hlen(b"nope"), 0);

        let all = store.hgetall(b"hKey").unwrap();
        assert_eq!(all.get(&b"name"[..]), Some(&Bytes::from("zhangSan")));
    }

    #[test]
    fn test_expired_hash() {
        let store = person();
        store.expire(b"hKey", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(store.hget(b"hKey", b"name"), Err(CacheError::KeyNotFound));
        assert!(!store.exists(b"hKey"));
    }
}
