//! Keyspace directory: which typed store owns each key

use crate::store::KeyType;
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

/// key -> type tag
///
/// Holds exactly one tag per key present in a typed store. The cache
/// keeps it behind its own lock and updates it in the same critical
/// section as the store call it routes.
#[derive(Debug, Default)]
pub struct Directory {
    types: HashMap<Bytes, KeyType, BuildHasherDefault<SipHasher13>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Directory {
            types: HashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Tag `key` as owned by the `kind` store
    pub fn record(&mut self, key: Bytes, kind: KeyType) {
        self.types.insert(key, kind);
    }

    pub fn type_of(&self, key: &[u8]) -> Option<KeyType> {
        self.types.get(key).copied()
    }

    /// Drop the tag, returning it if there was one
    pub fn forget(&mut self, key: &[u8]) -> Option<KeyType> {
        self.types.remove(key)
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
