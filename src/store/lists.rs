//! List store: double-ended sequences

use super::range::normalize;
use super::shared::{SharedMap, TypedStore};
use super::KeyType;
use crate::error::{CacheError, CacheResult};
use bytes::Bytes;
use std::collections::VecDeque;

/// key -> list of values, insertion order preserved
pub struct ListStore {
    items: SharedMap<VecDeque<Bytes>>,
}

impl ListStore {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ListStore {
            items: SharedMap::with_capacity(capacity),
        }
    }

    /// Prepend a value, creating the list if absent
    ///
    /// Returns true if the list already existed.
    pub fn lpush(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> bool {
        let mut items = self.items.write();
        let (list, existed) = items.get_or_insert_with(key.into(), VecDeque::new);
        list.push_front(value.into());
        existed
    }

    /// Append a value, creating the list if absent
    ///
    /// Returns true if the list already existed.
    pub fn rpush(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> bool {
        let mut items = self.items.write();
        let (list, existed) = items.get_or_insert_with(key.into(), VecDeque::new);
        list.push_back(value.into());
        existed
    }

    /// Remove and return the head of the list
    pub fn lpop(&self, key: &[u8]) -> CacheResult<Bytes> {
        self.items
            .write()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .ok_or(CacheError::EmptyCollection)
    }

    /// Remove and return the tail of the list
    pub fn rpop(&self, key: &[u8]) -> CacheResult<Bytes> {
        self.items
            .write()
            .get_mut(key)
            .and_then(VecDeque::pop_back)
            .ok_or(CacheError::EmptyCollection)
    }

    /// Length of the list, 0 if absent
    pub fn llen(&self, key: &[u8]) -> usize {
        self.items.read_live(key, VecDeque::len).unwrap_or(0)
    }

    /// Inclusive slice `[start, stop]`, negative indices count from the end
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Bytes>> {
        if start > stop {
            return Err(CacheError::InvalidRange { start, stop });
        }

        self.items
            .read_live(key, |list| {
                let (from, to) = normalize(start, stop, list.len())
                    .ok_or(CacheError::InvalidRange { start, stop })?;
                Ok(list.range(from..=to).cloned().collect())
            })
            .unwrap_or(Err(CacheError::EmptyCollection))
    }
}

impl Default for ListStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypedStore for ListStore {
    type Value = VecDeque<Bytes>;
    const KIND: KeyType = KeyType::List;

    fn shared(&self) -> &SharedMap<VecDeque<Bytes>> {
        &self.items
    }
}
